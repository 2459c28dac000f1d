//! Voltage trace collection and JSON output

use crate::error::CliResult;
use cabletree_core::CellMember;
use serde_json::json;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

/// A sampled voltage trace for one probe.
#[derive(Debug, Clone)]
pub struct SampleTrace {
    /// Probe id `(gid, index)`
    pub probe: CellMember,
    /// Trace name, e.g. `vsoma`
    pub name: String,
    /// Unit label
    pub units: String,
    /// Samples as `(time ms, value)` pairs
    pub samples: Vec<(f64, f64)>,
}

impl SampleTrace {
    /// Name a trace after its probe: index 0 sits on the soma, later probes
    /// on the dendrite.
    pub fn for_probe(probe: CellMember) -> Self {
        let location = if probe.index == 0 { "soma" } else { "dend" };
        Self {
            probe,
            name: format!("v{}", location),
            units: "mV".into(),
            samples: Vec::new(),
        }
    }

    /// Output path under the given prefix:
    /// `<prefix><gid>.<index>_<name>.json`.
    pub fn path(&self, prefix: &str) -> PathBuf {
        PathBuf::from(format!(
            "{}{}.{}_{}.json",
            prefix, self.probe.gid, self.probe.index, self.name
        ))
    }

    /// Write the trace as a JSON document.
    pub fn write_json(&self, prefix: &str) -> CliResult<PathBuf> {
        let times: Vec<f64> = self.samples.iter().map(|s| s.0).collect();
        let values: Vec<f64> = self.samples.iter().map(|s| s.1).collect();
        let mut data = serde_json::Map::new();
        data.insert("time".into(), json!(times));
        data.insert(self.name.clone(), json!(values));
        let doc = json!({
            "name": self.name,
            "units": self.units,
            "cell": self.probe.gid,
            "probe": self.probe.index,
            "data": data,
        });

        let path = self.path(prefix);
        let file = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(file, &doc)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn trace_names_follow_probe_index() {
        assert_eq!(SampleTrace::for_probe(CellMember::new(3, 0)).name, "vsoma");
        assert_eq!(SampleTrace::for_probe(CellMember::new(3, 1)).name, "vdend");
    }

    #[test]
    fn path_embeds_probe_id() {
        let trace = SampleTrace::for_probe(CellMember::new(12, 1));
        assert_eq!(
            trace.path("trace_"),
            PathBuf::from("trace_12.1_vdend.json")
        );
    }

    #[test]
    fn json_document_round_trips() {
        let dir = tempdir().unwrap();
        let prefix = format!("{}/t_", dir.path().display());
        let mut trace = SampleTrace::for_probe(CellMember::new(0, 0));
        trace.samples = vec![(0.0, -65.0), (0.1, -64.5)];

        let path = trace.write_json(&prefix).unwrap();
        let doc: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();

        assert_eq!(doc["name"], "vsoma");
        assert_eq!(doc["cell"], 0);
        assert_eq!(doc["data"]["time"].as_array().unwrap().len(), 2);
        assert_eq!(doc["data"]["vsoma"][1], -64.5);
    }
}
