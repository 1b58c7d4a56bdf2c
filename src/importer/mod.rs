// ==========================================
// FieldOps stock engine - import layer
// ==========================================
// Equipment inventory files (Excel, CSV) into the equipment table
// ==========================================

pub mod equipment_importer;
pub mod error;
pub mod file_parser;

pub use equipment_importer::{EquipmentImportReport, EquipmentImporter, SkipReason, SkippedRow};
pub use error::{ImportError, ImportResult};
pub use file_parser::{CsvParser, ExcelParser, FileParser, RawRow, UniversalFileParser};
