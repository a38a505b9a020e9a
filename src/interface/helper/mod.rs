pub mod coalesce;
pub mod nullable;
