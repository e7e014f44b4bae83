//! List command implementation.

use super::{open_read_only, CommandResult};
use crate::Format;
use std::path::Path;
use syncbridge_core::store::SyncRecordStore;
use syncbridge_core::{FlowType, SyncStatus, SynchronizationRecord};

/// Record filter; unset fields match everything.
#[derive(Debug, Default)]
pub struct Filter {
    /// Status name.
    pub status: Option<String>,
    /// Batch id.
    pub operation_id: Option<String>,
    /// Direction.
    pub flow: Option<FlowType>,
}

impl Filter {
    fn matches(&self, record: &SynchronizationRecord) -> bool {
        self.status
            .as_deref()
            .map_or(true, |s| record.status == SyncStatus::parse(s))
            && self
                .operation_id
                .as_deref()
                .map_or(true, |id| record.operation_id == id)
            && self.flow.map_or(true, |f| record.flow_type == f)
    }
}

/// Runs the list command.
pub fn run(path: &Path, filter: &Filter, format: Format) -> CommandResult<()> {
    let store = open_read_only(path)?;
    let records: Vec<_> = store
        .all()?
        .into_iter()
        .filter(|r| filter.matches(r))
        .collect();

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&records)?),
        Format::Text => {
            for record in &records {
                println!("{}", summary_line(record));
            }
            println!();
            println!("{} record(s)", records.len());
        }
    }
    Ok(())
}

pub(crate) fn summary_line(record: &SynchronizationRecord) -> String {
    format!(
        "{:>6}  {:<9}  {:<24}  {:<24}  {:<36}  {}",
        record.id.map(|id| id.to_string()).unwrap_or_default(),
        record.flow_type,
        record.status,
        record.operation_code,
        record.sync_id.as_deref().unwrap_or("-"),
        record.operation_id,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_combines_every_field() {
        let record = SynchronizationRecord::new(FlowType::Incoming, "products", "IN")
            .with_operation_id("op1")
            .with_status(SyncStatus::Ok);

        assert!(Filter::default().matches(&record));
        let filter = Filter {
            status: Some("sync_ok".into()),
            operation_id: Some("op1".into()),
            flow: Some(FlowType::Incoming),
        };
        assert!(filter.matches(&record));
        let filter = Filter {
            flow: Some(FlowType::Outcoming),
            ..Filter::default()
        };
        assert!(!filter.matches(&record));
    }
}
