pub mod agile;
pub mod issue;
pub mod meta;
