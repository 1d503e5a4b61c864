//! Rendering of core results into files or streams. Where the bytes end up
//! is the caller's business.

use anyhow::Result;
use std::io::Write;

use crate::application::MonthlyReport;
use crate::domain::{JournalEntry, format_cents};

/// Export a monthly report as CSV: one row per service, amounts in cents.
/// Returns the number of service rows written.
pub fn write_report_csv<W: Write>(report: &MonthlyReport, writer: W) -> Result<usize> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    csv_writer.write_record(["service_id", "total_revenue"])?;
    for service in &report.services {
        csv_writer.write_record([
            service.service_id.to_string(),
            service.total_revenue.to_string(),
        ])?;
    }

    csv_writer.flush()?;
    Ok(report.services.len())
}

/// Export a monthly report as pretty-printed JSON.
pub fn write_report_json<W: Write>(report: &MonthlyReport, mut writer: W) -> Result<()> {
    serde_json::to_writer_pretty(&mut writer, report)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

/// Export journal entries as CSV, with the amount both in cents and as a
/// decimal for readability.
pub fn write_journal_csv<W: Write>(entries: &[JournalEntry], writer: W) -> Result<usize> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    csv_writer.write_record(["id", "user_id", "amount", "amount_decimal", "message", "created"])?;
    for entry in entries {
        csv_writer.write_record([
            entry.id.to_string(),
            entry.user_id.to_string(),
            entry.amount.to_string(),
            format_cents(entry.amount),
            entry.message.clone(),
            entry.created.to_rfc3339(),
        ])?;
    }

    csv_writer.flush()?;
    Ok(entries.len())
}
