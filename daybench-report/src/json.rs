//! JSON Output

use crate::aggregate::AggregateReport;
use crate::report::BenchReport;
use std::collections::BTreeMap;

/// Generate a prettified JSON report.
///
/// Serializes the full session report (metadata, per-unit statistics, total).
pub fn generate_json_report(report: &BenchReport) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(report)
}

/// Flat means in the driver's own layout (`{"01": .., "total": ..}`),
/// rounded to milliseconds like the driver's output
pub fn generate_timings_json(report: &AggregateReport) -> Result<String, serde_json::Error> {
    let rounded: BTreeMap<String, f64> = report
        .to_map()
        .into_iter()
        .map(|(key, secs)| (key, round_millis(secs)))
        .collect();
    serde_json::to_string_pretty(&rounded)
}

fn round_millis(secs: f64) -> f64 {
    (secs * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate;
    use crate::raw::parse;
    use crate::report::{ReportConfig, ReportMeta, SCHEMA_VERSION, SystemInfo};

    fn sample_aggregate() -> AggregateReport {
        let run = parse(r#"{"01": 2.0, "02": 3.0, "total": 5.0}"#).unwrap();
        aggregate(&[run], 0).unwrap()
    }

    #[test]
    fn test_timings_json_layout() {
        let json = generate_timings_json(&sample_aggregate()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"01": 2.0, "02": 3.0, "total": 5.0})
        );
    }

    #[test]
    fn test_timings_json_rounds_to_millis() {
        let runs = [
            parse(r#"{"01": 0.1, "02": 0.2, "03": 0.123, "total": 0.423}"#).unwrap(),
            parse(r#"{"01": 0.1, "02": 0.2, "03": 0.125, "total": 0.425}"#).unwrap(),
        ];
        let json = generate_timings_json(&aggregate(&runs, 0).unwrap()).unwrap();

        assert!(!json.contains("0000000"), "unrounded value in {}", json);
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["01"], 0.1);
        assert_eq!(value["03"], 0.124);
        assert_eq!(value["total"], 0.424);

        // The output reads back as a valid driver report
        assert!(parse(&json).is_ok());
    }

    #[test]
    fn test_bench_report_serializes_metadata() {
        let meta = ReportMeta {
            schema_version: SCHEMA_VERSION,
            version: "0.1.0".to_string(),
            timestamp: chrono::Utc::now(),
            git_commit: None,
            git_branch: Some("main".to_string()),
            system: SystemInfo {
                os: "linux".to_string(),
                os_version: "6.1".to_string(),
                cpu: "test cpu".to_string(),
                cpu_cores: 4,
            },
            config: ReportConfig {
                platform: "linux".to_string(),
                repetitions: Some(5),
                runs: 1,
                warmup_runs: 0,
                compiler: "ocen".to_string(),
                compiler_flags: vec!["-O3".to_string()],
            },
        };
        let report = BenchReport::new(meta, &sample_aggregate());
        let json = generate_json_report(&report).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["total_secs"], 5.0);
        assert_eq!(value["units"][0]["id"], 1);
        assert_eq!(value["units"][1]["mean_secs"], 3.0);
        assert_eq!(value["meta"]["config"]["platform"], "linux");
        assert_eq!(value["meta"]["git_commit"], serde_json::Value::Null);
    }
}
