use clap::ValueEnum;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputMode {
    /// Refreshing terminal table
    Table,
    /// One JSON snapshot per line
    Json,
}
