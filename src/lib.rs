// Vendor Pricing - Core Library
// Normalizes used-phone wholesale price lists (KT Corp, Sell Atlas) into one JSON schema

pub mod offer;
pub mod fields;
pub mod parser;
pub mod merge;
pub mod output;
pub mod config;
pub mod pipeline;

// Re-export commonly used types
pub use offer::{
    Grade, LockStatus, Prices, DeviceOffer, MergeKey, MergedDevice,
};
pub use fields::{clean_price, extract_storage, storage_capacity_gb};
pub use parser::{
    VendorParser, RowParser, FileValidator,
    SourceKind, DeviceFamily, ModelContext, GradeColumns, BPlusPolicy, ParserOptions,
    detect_source, get_parser, read_csv_rows,
    KtCsvParser, KtExcelParser, SellAtlasParser,
};
pub use merge::{MergeEngine, sort_devices};
pub use output::{PricingDocument, read_document};
pub use config::{Config, SourceConfig, OutputConfig, SummaryConfig};
pub use pipeline::{
    RunReport, SourceRun, SourceStatus, OutputReport, ModelSummary,
    load_source, build_document, run, run_at, top_models, log_summary,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
