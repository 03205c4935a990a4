pub mod merge;
pub mod partition;
pub mod record;
pub mod scan;
pub mod search;
