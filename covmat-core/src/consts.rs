// Store member names
pub const FULL_NAME: &str = "FullName";
pub const LENGTH: &str = "Length";
pub const UNIQUE_READ_COUNT: &str = "UniqueReadCount";
pub const BASE_DEPTH: &str = "BaseDepth";
pub const CLIP_END_COUNT: &str = "ClipEndCount";

// Feature files
pub const FEATURE_DELIMITER: char = '\t';
pub const FEATURE_COMMENT: char = '#';
pub const FEATURE_COLUMNS: usize = 9;
pub const ATTRIBUTE_SEPARATOR: char = ';';
pub const ATTRIBUTE_ASSIGN: char = '=';

pub const GZ_FILE_EXTENSION: &str = "gz";
pub const BAI_FILE_EXTENSION: &str = "bai";
