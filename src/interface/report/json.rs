use std::io::Write;

use crate::{assault::reportable::Summary, error::ReportError};

pub trait JsonReport {
    fn json_report<W: Write>(&self, w: W) -> Result<(), ReportError>;
}

impl JsonReport for Summary {
    fn json_report<W: Write>(&self, mut w: W) -> Result<(), ReportError> {
        serde_json::to_writer_pretty(&mut w, self)?;
        writeln!(w)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::Value;

    use crate::assault::{measure::recorder::Recorder, outcome::Outcome};

    use super::*;

    #[test]
    fn test_json_report() {
        let mut recorder = Recorder::new([0.9]).unwrap();
        recorder.check("is status 200", true);
        recorder.iteration(Duration::from_millis(1500));
        let options = r#"{"vus": 1, "iterations": 1, "ext": {"tag": "dashboard"}}"#.parse().unwrap();
        let summary = Summary::new(&Outcome::new(options, recorder, 1, Duration::from_millis(1500)), &[90.]);

        let mut buf = Vec::new();
        summary.json_report(&mut buf).unwrap();
        let json: Value = serde_json::from_slice(&buf).unwrap();

        assert_json_diff::assert_json_include!(
            actual: json.clone(),
            expected: serde_json::json!({
                "options": {"vus": 1, "iterations": 1, "ext": {"tag": "dashboard"}},
                "vus": 1,
                "elapsed": 1500.0,
                "checks": {"is status 200": {"pass": 1, "fail": 0, "rate": 1.0}},
                "metrics": {
                    "checks": {"pass": 1, "fail": 0, "rate": 1.0},
                    "iterations": {"count": 1},
                    "interrupted_iterations": 0,
                },
            })
        );
        assert!(json.get("thresholds").is_none());
        // no request was made, so the failure rate is NaN
        assert_eq!(json["metrics"]["http_req_failed"]["rate"], Value::Null);
    }
}
