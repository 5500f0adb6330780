//! LogSink - logs a one-line summary of every publication

use contracts::{ContractError, Publication, PublicationSink, SensorData};
use tracing::{debug, info, instrument};

pub struct LogSink {
    name: String,
    written: u64,
}

impl LogSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            written: 0,
        }
    }

    fn summarize(&self, publication: &Publication) {
        match publication {
            Publication::StaticTransform(t) => debug!(
                sink = %self.name,
                parent = %t.transform.parent_frame,
                child = %t.transform.child_frame,
                "Static transform"
            ),
            Publication::VehicleState(s) => debug!(
                sink = %self.name,
                vehicle_id = %s.vehicle_id,
                x = s.state.position.x,
                y = s.state.position.y,
                z = s.state.position.z,
                "Vehicle state"
            ),
            Publication::SensorSample(s) => {
                let payload = match &s.reading.data {
                    SensorData::Image { width, height, .. } => format!("image {width}x{height}"),
                    SensorData::PointCloud { num_points, .. } => format!("{num_points} points"),
                    SensorData::Imu { .. } => "imu".to_string(),
                    SensorData::Gps { .. } => "gps".to_string(),
                    SensorData::Values { values } => format!("{} values", values.len()),
                };
                info!(
                    sink = %self.name,
                    topic = %s.topic,
                    frame = s.reading.frame,
                    payload = %payload,
                    "Sensor sample"
                );
            }
            Publication::RoadNetwork(n) => info!(
                sink = %self.name,
                polylines = n.polylines.len(),
                "Road network"
            ),
        }
    }
}

impl PublicationSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_write",
        skip(self, publication),
        fields(sink = %self.name, kind = publication.kind().as_str())
    )]
    async fn write(&mut self, publication: &Publication) -> Result<(), ContractError> {
        self.summarize(publication);
        self.written += 1;
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        info!(sink = %self.name, written = self.written, "LogSink closed");
        Ok(())
    }
}
