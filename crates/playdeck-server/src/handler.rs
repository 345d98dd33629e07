// crates/playdeck-server/src/handler.rs
//
// Command execution against a set of channels.
//
// Reply classes follow the wire convention: 2xx success, 4xx client error
// (bad channel, bad parameter, media not found — layer state unchanged),
// 5xx server failure.

use std::time::Duration;

use log::debug;
use playdeck_core::error::PlayoutError;
use playdeck_engine::channel::Channel;
use playdeck_engine::layer::LoadOption;
use playdeck_engine::transition::TransitionProducer;
use playdeck_media::registry::ProducerRegistry;

use crate::command::Command;
use crate::info::ChannelInfo;

/// How long a CG call may take before the handler reports failure.
const CG_CALL_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reply {
    pub code: u16,
    pub text: String,
}

impl Reply {
    fn ok(verb: &str) -> Reply {
        Reply { code: 202, text: format!("202 {verb} OK") }
    }

    fn data(verb: &str, payload: String) -> Reply {
        Reply { code: 201, text: format!("201 {verb} OK\n{payload}") }
    }

    fn client_error(verb: &str) -> Reply {
        Reply { code: 404, text: format!("404 {verb} ERROR") }
    }

    fn failed(verb: &str) -> Reply {
        Reply { code: 502, text: format!("502 {verb} FAILED") }
    }

    fn from_result(verb: &str, result: Result<(), PlayoutError>) -> Reply {
        match result {
            Ok(()) => Reply::ok(verb),
            Err(e) => Reply::from_error(verb, &e),
        }
    }

    fn from_error(verb: &str, error: &PlayoutError) -> Reply {
        debug!("{verb} rejected: {error}");
        match error {
            PlayoutError::InvalidArgument(_)
            | PlayoutError::MediaNotFound(_)
            | PlayoutError::Unsupported => Reply::client_error(verb),
            _ => Reply::failed(verb),
        }
    }
}

pub struct Server {
    channels: Vec<Channel>,
    registry: ProducerRegistry,
}

impl Server {
    pub fn new(channels: Vec<Channel>, registry: ProducerRegistry) -> Server {
        Server { channels, registry }
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    fn channel(&self, index: usize) -> Result<&Channel, PlayoutError> {
        index
            .checked_sub(1)
            .and_then(|i| self.channels.get(i))
            .ok_or_else(|| PlayoutError::InvalidArgument(format!("no channel {index}")))
    }

    pub fn execute(&self, command: Command) -> Reply {
        match command {
            Command::Load { address, params, auto_play } => {
                let verb = "LOAD";
                let result = self.channel(address.channel).and_then(|channel| {
                    let producer = self.registry.resolve(&channel.factory(), &params)?;
                    let option = if auto_play { LoadOption::AutoPlay } else { LoadOption::Preview };
                    channel.load(address.layer, producer, option)
                });
                Reply::from_result(verb, result)
            }

            Command::LoadBg { address, params, transition, auto_play } => {
                let verb = "LOADBG";
                let result = self.channel(address.channel).and_then(|channel| {
                    let factory = channel.factory();
                    let mut producer = self.registry.resolve(&factory, &params)?;
                    if let Some(t) = transition {
                        let info = t.to_info().ok_or_else(|| {
                            PlayoutError::InvalidArgument("bad border color".into())
                        })?;
                        producer = Box::new(TransitionProducer::new(producer, info, factory)?);
                    }
                    let option = if auto_play { LoadOption::AutoPlay } else { LoadOption::None };
                    channel.load(address.layer, producer, option)
                });
                Reply::from_result(verb, result)
            }

            Command::Play { address } => Reply::from_result(
                "PLAY",
                self.channel(address.channel).and_then(|c| c.play(address.layer)),
            ),

            Command::Stop { address } => Reply::from_result(
                "STOP",
                self.channel(address.channel).and_then(|c| c.stop_layer(address.layer)),
            ),

            Command::Clear { channel, layer } => {
                let result = self.channel(channel).and_then(|c| match layer {
                    Some(layer) => c.clear_layer(layer),
                    None => {
                        c.clear_all();
                        Ok(())
                    }
                });
                Reply::from_result("CLEAR", result)
            }

            Command::Cg { address, verb, args } => {
                let result = self.channel(address.channel).and_then(|channel| {
                    let mut params = vec![verb.token().to_string()];
                    params.extend(args);
                    let future = channel.call(address.layer, &params)?;
                    future.wait(CG_CALL_TIMEOUT)
                });
                match result {
                    Ok(payload) if payload.is_empty() => Reply::ok("CG"),
                    Ok(payload) => Reply::data("CG", payload),
                    Err(e) => Reply::from_error("CG", &e),
                }
            }

            Command::Info { channel, layer } => {
                let result = self.channel(channel).map(|c| {
                    let mut info = ChannelInfo::from_status(channel, &c.status());
                    if let Some(layer) = layer {
                        info = info.only_layer(layer);
                    }
                    serde_json::to_string_pretty(&info).unwrap_or_else(|_| "{}".into())
                });
                match result {
                    Ok(payload) => Reply::data("INFO", payload),
                    Err(e) => Reply::from_error("INFO", &e),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use playdeck_core::consumer::Consumer;
    use playdeck_core::error::PlayoutError;
    use playdeck_core::format::{FormatDesc, VideoFormat};
    use playdeck_core::frame::Frame;
    use std::sync::Arc;

    /// Discards every frame; clocked so tests run unthrottled.
    struct NullConsumer;

    impl Consumer for NullConsumer {
        fn name(&self) -> String {
            "null".into()
        }
        fn initialize(&mut self, _desc: &FormatDesc) -> Result<(), PlayoutError> {
            Ok(())
        }
        fn prepare(&mut self, _frame: &Arc<Frame>) -> Result<(), PlayoutError> {
            Ok(())
        }
        fn display(&mut self, _frame: &Arc<Frame>) -> Result<(), PlayoutError> {
            Ok(())
        }
        fn has_synchronization_clock(&self) -> bool {
            true
        }
        fn index(&self) -> usize {
            999
        }
    }

    fn server() -> Server {
        let channel =
            Channel::new(VideoFormat::X720p5000, vec![Box::new(NullConsumer)]).unwrap();
        Server::new(vec![channel], ProducerRegistry::new("/tmp"))
    }

    fn run(server: &Server, line: &str) -> Reply {
        server.execute(Command::parse(line).unwrap())
    }

    #[test]
    fn load_play_stop_clear_round() {
        let s = server();
        assert_eq!(run(&s, "LOAD 1-10 #FFFF0000").code, 202);
        assert_eq!(run(&s, "PLAY 1-10").code, 202);
        assert_eq!(run(&s, "STOP 1-10").code, 202);
        assert_eq!(run(&s, "CLEAR 1-10").code, 202);
        assert_eq!(run(&s, "CLEAR 1").code, 202);
    }

    #[test]
    fn loadbg_with_transition_then_play() {
        let s = server();
        assert_eq!(run(&s, "LOAD 1-10 #FF000000 AUTOPLAY").code, 202);
        assert_eq!(run(&s, "LOADBG 1-10 #FFFFFFFF MIX 25").code, 202);
        assert_eq!(run(&s, "PLAY 1-10").code, 202);
    }

    #[test]
    fn bad_channel_is_client_error() {
        let s = server();
        assert_eq!(run(&s, "PLAY 9-10").code, 404);
        assert_eq!(run(&s, "LOAD 0-1 #FFFF0000").code, 404);
    }

    #[test]
    fn unknown_spec_is_client_error() {
        let s = server();
        assert_eq!(run(&s, "LOAD 1-10 nonsense").code, 404);
        assert_eq!(run(&s, "LOAD 1-10 missing.mov").code, 404);
    }

    #[test]
    fn play_before_load_is_client_error() {
        let s = server();
        assert_eq!(run(&s, "PLAY 1-10").code, 404);
    }

    #[test]
    fn zero_duration_transition_is_client_error() {
        let s = server();
        assert_eq!(run(&s, "LOADBG 1-10 #FFFFFFFF MIX 0").code, 404);
    }

    #[test]
    fn cg_on_non_template_layer_is_client_error() {
        let s = server();
        assert_eq!(run(&s, "LOAD 1-20 #FFFF0000 AUTOPLAY").code, 202);
        // The color producer does not implement `call`.
        assert_eq!(run(&s, "CG 1-20 PLAY").code, 404);
    }

    #[test]
    fn info_returns_json_payload() {
        let s = server();
        run(&s, "LOAD 1-10 #FFFF0000 AUTOPLAY");
        let reply = run(&s, "INFO 1");
        assert_eq!(reply.code, 201);
        assert!(reply.text.contains("\"format\": \"720p5000\""));
        assert!(reply.text.contains("color[#FFFF0000]"));
    }

    #[test]
    fn color_channel_records_its_constant_image() {
        use playdeck_engine::consumers::{RawFileReader, RecordConsumer};

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("air.pdr");

        // Recorder only: no synchronization clock, so the internal timer
        // paces the channel at the format rate.
        let channel = Channel::new(
            VideoFormat::X720p5000,
            vec![Box::new(RecordConsumer::to_file(&path))],
        )
        .unwrap();
        let s = Server::new(vec![channel], ProducerRegistry::new("/tmp"));

        assert_eq!(run(&s, "LOAD 1-10 #FFFF0000 AUTOPLAY").code, 202);
        std::thread::sleep(std::time::Duration::from_millis(300));
        drop(s); // stops the channel and finalizes the recording

        // Every recorded frame is either warm-up black or the constant
        // opaque red, and red frames were captured.
        let mut reader = RawFileReader::open(&path).unwrap();
        let mut red_frames = 0;
        let mut total = 0;
        while let Some((image, _audio)) = reader.next_frame().unwrap() {
            total += 1;
            let px = &image[..4];
            if px == [0, 0, 255, 255] {
                assert!(
                    image.chunks_exact(4).all(|p| p == [0, 0, 255, 255]),
                    "red frame was not uniform"
                );
                red_frames += 1;
            } else {
                assert_eq!(px, [0, 0, 0, 0], "unexpected pixel in frame {total}");
            }
        }
        assert!(red_frames > 0, "no red frames reached the recording");
    }
}
