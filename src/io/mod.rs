pub mod report;
pub mod table;
pub mod textgrid;

pub use report::FileReport;
pub use table::{data_columns, MetricsTable, TableRow};
pub use self::textgrid::{read_textgrid, write_textgrid};
