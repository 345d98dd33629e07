// crates/playdeck-server/src/info.rs
//
// Serializable snapshots for the INFO command.

use playdeck_engine::channel::ChannelStatus;
use serde::Serialize;

#[derive(Serialize)]
pub struct ChannelInfo {
    pub channel: usize,
    pub format: String,
    pub tick: u64,
    pub layers: Vec<LayerInfo>,
}

#[derive(Serialize)]
pub struct LayerInfo {
    pub index: i32,
    pub foreground: Option<String>,
    pub background: Option<String>,
    pub has_preview: bool,
    pub late_frames: u64,
}

impl ChannelInfo {
    pub fn from_status(channel: usize, status: &ChannelStatus) -> ChannelInfo {
        ChannelInfo {
            channel,
            format: status.format.clone(),
            tick: status.tick,
            layers: status
                .layers
                .iter()
                .map(|(index, layer)| LayerInfo {
                    index: *index,
                    foreground: layer.foreground.clone(),
                    background: layer.background.clone(),
                    has_preview: layer.has_preview,
                    late_frames: layer.late_frames,
                })
                .collect(),
        }
    }

    /// Restrict the snapshot to one layer.
    pub fn only_layer(mut self, index: i32) -> ChannelInfo {
        self.layers.retain(|l| l.index == index);
        self
    }
}
