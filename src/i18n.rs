// ==========================================
// Internationalization
// ==========================================
// rust-i18n, locales: es (default), en
// The rust_i18n::i18n! macro is invoked in lib.rs
// ==========================================

pub fn current_locale() -> String {
    rust_i18n::locale().to_string()
}

/// Switch the process-wide locale ("es" or "en")
pub fn set_locale(locale: &str) {
    rust_i18n::set_locale(locale);
}

/// Translate a key
///
/// ```no_run
/// use fieldops_stock::i18n::t;
/// let msg = t("common.success");
/// ```
pub fn t(key: &str) -> String {
    rust_i18n::t!(key).to_string()
}

/// Translate a key and fill `%{name}` placeholders
///
/// ```no_run
/// use fieldops_stock::i18n::t_with_args;
/// let msg = t_with_args("errors.not_found", &[("detail", "crew C9")]);
/// ```
pub fn t_with_args(key: &str, args: &[(&str, &str)]) -> String {
    let mut result = rust_i18n::t!(key).to_string();
    for (k, v) in args {
        let placeholder = format!("%{{{}}}", k);
        result = result.replace(&placeholder, v);
    }
    result
}
