use anyhow::Result;
use prometheus::proto::MetricFamily;
use prometheus::{Encoder, TextEncoder};

pub struct PrometheusExporter;

impl PrometheusExporter {
    pub fn content_type() -> &'static str {
        prometheus::TEXT_FORMAT
    }

    pub fn render(families: &[MetricFamily]) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
