// crates/playdeck-server/src/command.rs
//
// Typed control commands and the line tokenizer the console front-end
// feeds them through. The full protocol grammar lives in the protocol
// layer; what is parsed here is the token shapes the engine itself
// defines: channel-layer addresses, transition blocks, CG verbs.

use playdeck_core::color;
use playdeck_core::tween::Tween;
use playdeck_engine::transition::{Direction, TransitionInfo, TransitionKind};

/// `<channel>[-<layer>]`, channels 1-based, layer defaulting to 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Address {
    pub channel: usize,
    pub layer: i32,
}

impl Address {
    pub fn parse(token: &str) -> Option<Address> {
        match token.split_once('-') {
            Some((ch, layer)) => Some(Address {
                channel: ch.parse().ok()?,
                layer: layer.parse().ok()?,
            }),
            None => Some(Address { channel: token.parse().ok()?, layer: 0 }),
        }
    }
}

/// Transition block attached to a LOADBG.
#[derive(Clone, Debug, PartialEq)]
pub struct TransitionParams {
    pub kind: TransitionKind,
    pub duration: u32,
    pub direction: Direction,
    pub border_color: Option<String>,
    pub border_width: usize,
}

impl TransitionParams {
    /// Convert to the engine config, resolving the border color spec.
    pub fn to_info(&self) -> Option<TransitionInfo> {
        let mut info = TransitionInfo::new(self.kind, self.duration);
        info.direction = self.direction;
        info.tween = Tween::Linear;
        info.border_width = self.border_width;
        if let Some(spec) = &self.border_color {
            info.border_color = color::parse(spec)?;
        }
        Some(info)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CgVerb {
    Add,
    Play,
    Stop,
    Next,
    Update,
    Invoke,
    Remove,
    Clear,
}

impl CgVerb {
    fn parse(token: &str) -> Option<CgVerb> {
        match token.to_ascii_uppercase().as_str() {
            "ADD" => Some(CgVerb::Add),
            "PLAY" => Some(CgVerb::Play),
            "STOP" => Some(CgVerb::Stop),
            "NEXT" => Some(CgVerb::Next),
            "UPDATE" => Some(CgVerb::Update),
            "INVOKE" => Some(CgVerb::Invoke),
            "REMOVE" => Some(CgVerb::Remove),
            "CLEAR" => Some(CgVerb::Clear),
            _ => None,
        }
    }

    pub fn token(&self) -> &'static str {
        match self {
            CgVerb::Add => "ADD",
            CgVerb::Play => "PLAY",
            CgVerb::Stop => "STOP",
            CgVerb::Next => "NEXT",
            CgVerb::Update => "UPDATE",
            CgVerb::Invoke => "INVOKE",
            CgVerb::Remove => "REMOVE",
            CgVerb::Clear => "CLEAR",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Load { address: Address, params: Vec<String>, auto_play: bool },
    LoadBg {
        address: Address,
        params: Vec<String>,
        transition: Option<TransitionParams>,
        auto_play: bool,
    },
    Play { address: Address },
    Stop { address: Address },
    Clear { channel: usize, layer: Option<i32> },
    Cg { address: Address, verb: CgVerb, args: Vec<String> },
    Info { channel: usize, layer: Option<i32> },
}

/// Parse failure: the verb that failed and why, for the 400 reply.
#[derive(Clone, Debug, PartialEq)]
pub struct ParseError(pub String);

impl Command {
    pub fn parse(line: &str) -> Result<Command, ParseError> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some((&verb, rest)) = tokens.split_first() else {
            return Err(ParseError("empty command".into()));
        };

        let address_of = |rest: &[&str]| -> Result<Address, ParseError> {
            rest.first()
                .and_then(|t| Address::parse(t))
                .ok_or_else(|| ParseError("bad channel-layer address".into()))
        };

        match verb.to_ascii_uppercase().as_str() {
            "LOAD" => {
                let address = address_of(rest)?;
                let (params, auto_play) = split_flags(&rest[1..]);
                if params.is_empty() {
                    return Err(ParseError("LOAD requires a producer spec".into()));
                }
                Ok(Command::Load { address, params, auto_play })
            }
            "LOADBG" => {
                let address = address_of(rest)?;
                let (params, auto_play) = split_flags(&rest[1..]);
                let (params, transition) = split_transition(params)?;
                if params.is_empty() {
                    return Err(ParseError("LOADBG requires a producer spec".into()));
                }
                Ok(Command::LoadBg { address, params, transition, auto_play })
            }
            "PLAY" => Ok(Command::Play { address: address_of(rest)? }),
            "STOP" => Ok(Command::Stop { address: address_of(rest)? }),
            "CLEAR" => {
                let token = rest
                    .first()
                    .ok_or_else(|| ParseError("CLEAR requires a channel".into()))?;
                match token.split_once('-') {
                    Some(_) => {
                        let address = address_of(rest)?;
                        Ok(Command::Clear { channel: address.channel, layer: Some(address.layer) })
                    }
                    None => {
                        let channel = token
                            .parse()
                            .map_err(|_| ParseError("bad channel".into()))?;
                        Ok(Command::Clear { channel, layer: None })
                    }
                }
            }
            "CG" => {
                let address = address_of(rest)?;
                let verb = rest
                    .get(1)
                    .and_then(|t| CgVerb::parse(t))
                    .ok_or_else(|| ParseError("bad CG subcommand".into()))?;
                let args = rest[2..].iter().map(|s| s.to_string()).collect();
                Ok(Command::Cg { address, verb, args })
            }
            "INFO" => match rest.first() {
                None => Err(ParseError("INFO requires a channel".into())),
                Some(token) => match token.split_once('-') {
                    Some(_) => {
                        let address = address_of(rest)?;
                        Ok(Command::Info { channel: address.channel, layer: Some(address.layer) })
                    }
                    None => {
                        let channel = token
                            .parse()
                            .map_err(|_| ParseError("bad channel".into()))?;
                        Ok(Command::Info { channel, layer: None })
                    }
                },
            },
            other => Err(ParseError(format!("unknown command {other}"))),
        }
    }
}

/// Strip the trailing AUTOPLAY flag; everything else stays in order.
fn split_flags(tokens: &[&str]) -> (Vec<String>, bool) {
    let mut auto_play = false;
    let params = tokens
        .iter()
        .filter(|t| {
            if t.eq_ignore_ascii_case("AUTOPLAY") {
                auto_play = true;
                false
            } else {
                true
            }
        })
        .map(|s| s.to_string())
        .collect();
    (params, auto_play)
}

/// Split `spec… [<kind> <duration> [<direction>] [<border-color>
/// [<border-width>]]]` into producer params and the transition block.
fn split_transition(
    params: Vec<String>,
) -> Result<(Vec<String>, Option<TransitionParams>), ParseError> {
    // The spec itself can never be a transition token, so scan from the
    // second parameter.
    let Some(at) = params
        .iter()
        .enumerate()
        .skip(1)
        .find_map(|(i, p)| TransitionKind::from_name(p).map(|k| (i, k)))
    else {
        return Ok((params, None));
    };
    let (at, kind) = at;

    let block = &params[at + 1..];
    let duration: u32 = block
        .first()
        .and_then(|t| t.parse().ok())
        .ok_or_else(|| ParseError("transition requires a duration".into()))?;

    let mut transition = TransitionParams {
        kind,
        duration,
        direction: Direction::FromLeft,
        border_color: None,
        border_width: 0,
    };
    if let Some(direction) = block.get(1).and_then(|t| Direction::from_name(t)) {
        transition.direction = direction;
    }
    if let Some(border) = block.get(2) {
        transition.border_color = Some(border.clone());
        if let Some(width) = block.get(3).and_then(|t| t.parse().ok()) {
            transition.border_width = width;
        }
    }

    Ok((params[..at].to_vec(), Some(transition)))
}
