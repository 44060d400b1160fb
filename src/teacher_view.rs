use comfy_table::presets::ASCII_MARKDOWN;
use comfy_table::Table;

use crate::error::StorageError;
use crate::storage::StoredSubmission;

pub const EMPTY_LISTING: &str = "Aún no hay notas guardadas en la base de datos.";

/// Formats recent submissions as a plain-text table.
pub fn render_table(rows: &[StoredSubmission]) -> String {
    let mut table = Table::new();
    table
        .load_preset(ASCII_MARKDOWN)
        .set_header(vec!["Fecha y Hora", "ID Alumno", "ID Hoja", "Nota (%)"]);

    for row in rows {
        let created_at = row
            .created_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();
        table.add_row(vec![
            created_at,
            row.submission.student_key.clone(),
            row.submission.worksheet_id.clone(),
            format!("{:.2}", row.submission.score_percent),
        ]);
    }

    table.to_string()
}

/// The teacher's message for a listing attempt: the table, or an inline
/// error followed by the empty-listing notice.
pub fn render_listing(listing: Result<Vec<StoredSubmission>, StorageError>) -> String {
    match listing {
        Ok(rows) if rows.is_empty() => EMPTY_LISTING.to_string(),
        Ok(rows) => format!(
            "<b>📊 Registro de Notas</b>\n<pre>{}</pre>",
            teloxide::utils::html::escape(&render_table(&rows))
        ),
        Err(e) => {
            log::warn!("Could not load recent submissions: {}", e);
            format!(
                "Error al cargar las notas: {}\n\n{}",
                teloxide::utils::html::escape(&e.to_string()),
                EMPTY_LISTING
            )
        }
    }
}
