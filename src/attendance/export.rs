use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use super::record::EnrichedRecord;

const HEADER: &str =
    "Date,Check In,Check Out,Computed Check Out,Manual Check Out,Duration (mins),Status,Note";

/// Render enriched records as CSV. Fixed column order, every field quoted
/// (inner quotes doubled), instants shown in the user's timezone.
pub fn render_csv(rows: &[EnrichedRecord], tz: Tz) -> String {
    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(HEADER.to_string());

    for row in rows {
        let fields = [
            row.date.to_string(),
            display_instant(row.check_in_at, tz),
            row.check_out_at
                .map(|t| display_instant(t, tz))
                .unwrap_or_else(|| "Not checked out".to_string()),
            display_instant(row.computed_check_out_at, tz),
            row.manual_check_out_at
                .map(|t| display_instant(t, tz))
                .unwrap_or_default(),
            row.duration_minutes.to_string(),
            row.status.label().to_string(),
            row.note.clone().unwrap_or_default(),
        ];
        let line = fields
            .iter()
            .map(|f| quote(f))
            .collect::<Vec<_>>()
            .join(",");
        lines.push(line);
    }

    lines.join("\n")
}

fn display_instant(t: DateTime<Utc>, tz: Tz) -> String {
    t.with_timezone(&tz).format("%Y-%m-%d %H:%M:%S").to_string()
}

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance::record::AttendanceRecord;
    use chrono::{NaiveDate, TimeZone};

    fn row(note: Option<&str>) -> EnrichedRecord {
        let record = AttendanceRecord {
            id: 1,
            user_id: 7,
            date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            check_in_at: Utc.with_ymd_and_hms(2024, 1, 10, 3, 30, 0).unwrap(),
            computed_check_out_at: Utc.with_ymd_and_hms(2024, 1, 10, 11, 30, 0).unwrap(),
            check_out_at: None,
            manual_check_out_at: None,
            is_checked_out: false,
            note: note.map(String::from),
        };
        record.enriched(Utc.with_ymd_and_hms(2024, 1, 10, 10, 0, 0).unwrap())
    }

    #[test]
    fn renders_header_and_quoted_fields_in_user_timezone() {
        let tz: Tz = "Asia/Kolkata".parse().unwrap();
        let csv = render_csv(&[row(Some("client visit"))], tz);
        let mut lines = csv.lines();

        assert_eq!(
            lines.next().unwrap(),
            "Date,Check In,Check Out,Computed Check Out,Manual Check Out,Duration (mins),Status,Note"
        );
        assert_eq!(
            lines.next().unwrap(),
            "\"2024-01-10\",\"2024-01-10 09:00:00\",\"Not checked out\",\"2024-01-10 17:00:00\",\"\",\"480\",\"Active\",\"client visit\""
        );
        assert!(lines.next().is_none());
    }

    #[test]
    fn doubles_embedded_quotes() {
        let csv = render_csv(&[row(Some("met \"the\" client"))], chrono_tz::UTC);
        assert!(csv.contains("\"met \"\"the\"\" client\""));
    }

    #[test]
    fn empty_set_is_header_only() {
        assert_eq!(render_csv(&[], chrono_tz::UTC), HEADER);
    }
}
