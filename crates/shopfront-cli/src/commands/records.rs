use crate::commands::common::{format_record_lines, normalize_name, CliContext};
use crate::error::CliError;

pub async fn run_records(
    context: &CliContext,
    collection: &str,
    as_json: bool,
) -> Result<(), CliError> {
    let collection = normalize_name(collection).ok_or(CliError::EmptyCollection)?;
    let db = context.open_database().await?;
    let records = db.load_collection(&collection).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else if records.is_empty() {
        println!("No records in '{collection}'.");
    } else {
        for line in format_record_lines(&records) {
            println!("{line}");
        }
    }
    Ok(())
}
