//! Scan summary formatting.

use chrono::{DateTime, Local};

use crate::stats::StatsSnapshot;

/// Everything the end-of-run summary reports.
pub struct SummaryParams<'a> {
    pub query: &'a str,
    pub stats: StatsSnapshot,
    pub filters: &'a [String],
    pub start_time: DateTime<Local>,
    pub end_time: DateTime<Local>,
    pub check_enabled: bool,
    pub target_filename: &'a str,
    pub binary_output_path: &'a str,
}

/// Formats a timestamp for display in outputs.
pub fn format_timestamp(time: DateTime<Local>) -> String {
    time.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Renders the scan summary appended to `raw.txt` at end of run.
pub fn format_summary(params: &SummaryParams<'_>) -> String {
    let duration = params.end_time.signed_duration_since(params.start_time);
    let filters = if params.filters.is_empty() {
        "None".to_string()
    } else {
        params.filters.join(", ")
    };

    let mut summary = String::new();
    summary.push_str("=== Scan Summary ===\n");
    summary.push_str(&format!("Query: {}\n", params.query));
    summary.push_str(&format!(
        "Start time: {}\n",
        format_timestamp(params.start_time)
    ));
    summary.push_str(&format!("End time: {}\n", format_timestamp(params.end_time)));
    summary.push_str(&format!("Duration: {}s\n", duration.num_seconds()));
    summary.push_str(&format!("Total hosts found: {}\n", params.stats.total_hosts));
    summary.push_str(&format!("Online hosts: {}\n", params.stats.online_hosts));
    summary.push_str(&format!("Total files found: {}\n", params.stats.total_files));
    summary.push_str(&format!("Filtered files: {}\n", params.stats.filtered_files));
    summary.push_str(&format!("Applied filters: {filters}\n"));

    if params.check_enabled {
        summary.push_str("File check enabled: Yes\n");
        if !params.target_filename.is_empty() {
            summary.push_str(&format!("Target filename: {}\n", params.target_filename));
        }
        summary.push_str(&format!("Files checked: {}\n", params.stats.checked_files));
        summary.push_str(&format!(
            "Binary files found: {}\n",
            params.stats.binary_files_found
        ));
        if params.stats.binary_files_found > 0 {
            summary.push_str(&format!(
                "Binary files list: {}\n",
                params.binary_output_path
            ));
        }
    } else {
        summary.push_str("File check enabled: No\n");
    }

    summary.push_str("====================\n");
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn snapshot() -> StatsSnapshot {
        StatsSnapshot {
            total_hosts: 10,
            online_hosts: 4,
            total_files: 25,
            filtered_files: 7,
            checked_files: 5,
            binary_files_found: 2,
            write_errors: 0,
        }
    }

    fn times() -> (DateTime<Local>, DateTime<Local>) {
        let start = Local.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let end = Local.with_ymd_and_hms(2025, 6, 1, 12, 1, 30).unwrap();
        (start, end)
    }

    #[test]
    fn test_summary_with_check_enabled() {
        let (start_time, end_time) = times();
        let filters = vec![".exe".to_string(), ".msi".to_string()];
        let summary = format_summary(&SummaryParams {
            query: "services.http.response.html_title: 'Index of /'",
            stats: snapshot(),
            filters: &filters,
            start_time,
            end_time,
            check_enabled: true,
            target_filename: "payload.exe",
            binary_output_path: "./output/binary_found.txt",
        });

        assert!(summary.contains("Query: services.http.response.html_title: 'Index of /'"));
        assert!(summary.contains("Start time: 2025-06-01 12:00:00"));
        assert!(summary.contains("Duration: 90s"));
        assert!(summary.contains("Total hosts found: 10"));
        assert!(summary.contains("Online hosts: 4"));
        assert!(summary.contains("Applied filters: .exe, .msi"));
        assert!(summary.contains("Target filename: payload.exe"));
        assert!(summary.contains("Binary files found: 2"));
        assert!(summary.contains("Binary files list: ./output/binary_found.txt"));
    }

    #[test]
    fn test_summary_without_check() {
        let (start_time, end_time) = times();
        let summary = format_summary(&SummaryParams {
            query: "q",
            stats: StatsSnapshot::default(),
            filters: &[],
            start_time,
            end_time,
            check_enabled: false,
            target_filename: "",
            binary_output_path: "",
        });

        assert!(summary.contains("Applied filters: None"));
        assert!(summary.contains("File check enabled: No"));
        assert!(!summary.contains("Files checked:"));
        assert!(!summary.contains("Binary files list:"));
    }
}
