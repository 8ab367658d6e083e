// src/context/mod.rs

//! What the model gets to see: the files found next to a request and the
//! prompt context built from them.

pub mod discovery;
pub mod files;

pub use discovery::{DiscoveredFiles, FileKind, classify_file, discover_files, generate_output_filename};
pub use files::{DataFileAnalysis, FileType, analyze_data_file, build_file_context, detect_file_type};
