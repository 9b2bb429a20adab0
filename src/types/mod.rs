pub mod quote;
pub mod report;
pub mod snp;
