//! Control-plane commands: volume and mute, defaults, modules, samples,
//! lookups and stream moves.

use std::io::{Read, Write};

use pulsewire_proto::{ChannelVolume, CommandCode, Props, TagReader, TagWriter, Volume};

use crate::client::Client;
use crate::error::{ClientError, Result};

/// Selects a sink or source by server index or by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Index(u32),
    Name(String),
}

impl Target {
    /// The wire convention: a u32 index (or the sentinel) followed by a
    /// name (or the null string); exactly one of the two is meaningful.
    pub(crate) fn write(&self, w: &mut TagWriter) {
        match self {
            Target::Index(index) => {
                w.put_index(Some(*index));
                w.put_string(None);
            }
            Target::Name(name) => {
                w.put_index(None);
                w.put_string(Some(name));
            }
        }
    }
}

impl From<u32> for Target {
    fn from(index: u32) -> Self {
        Target::Index(index)
    }
}

impl From<&str> for Target {
    fn from(name: &str) -> Self {
        Target::Name(name.to_string())
    }
}

/// One value in a module argument string.
#[derive(Debug, Clone, PartialEq)]
enum ArgValue {
    Str(String),
    Bool(bool),
    Int(i64),
    Props(Props),
}

/// Builder for module argument strings.
///
/// Renders `key=value` pairs separated by spaces. Strings are
/// single-quoted with internal apostrophes escaped, property trees are
/// flattened and double-quoted, numbers and booleans go bare.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModuleArgs {
    entries: Vec<(String, ArgValue)>,
}

impl ModuleArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn string(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.push((key.into(), ArgValue::Str(value.into())));
        self
    }

    pub fn boolean(mut self, key: impl Into<String>, value: bool) -> Self {
        self.entries.push((key.into(), ArgValue::Bool(value)));
        self
    }

    pub fn int(mut self, key: impl Into<String>, value: i64) -> Self {
        self.entries.push((key.into(), ArgValue::Int(value)));
        self
    }

    pub fn props(mut self, key: impl Into<String>, value: Props) -> Self {
        self.entries.push((key.into(), ArgValue::Props(value)));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render the space-separated argument string.
    pub fn render(&self) -> String {
        let mut parts = Vec::with_capacity(self.entries.len());
        for (key, value) in &self.entries {
            let rendered = match value {
                ArgValue::Str(s) => format!("'{}'", s.replace('\'', "\\'")),
                ArgValue::Bool(b) => b.to_string(),
                ArgValue::Int(i) => i.to_string(),
                ArgValue::Props(props) => {
                    let flat = props
                        .deflate()
                        .into_iter()
                        .map(|(k, v)| format!("{k}={v}"))
                        .collect::<Vec<_>>()
                        .join(" ");
                    format!("\"{}\"", flat.replace('"', "\\\""))
                }
            };
            parts.push(format!("{key}={rendered}"));
        }
        parts.join(" ")
    }
}

impl<T: Read + Write> Client<T> {
    /// Set the volume of a sink.
    pub fn set_sink_volume(&mut self, sink: Target, volume: &ChannelVolume) -> Result<()> {
        check_volumes(volume)?;
        self.round_trip(CommandCode::SetSinkVolume, |w| {
            sink.write(w);
            w.put_cvolume(volume);
            Ok(())
        })
        .map(drop)
    }

    /// Set the volume of a source.
    pub fn set_source_volume(&mut self, source: Target, volume: &ChannelVolume) -> Result<()> {
        check_volumes(volume)?;
        self.round_trip(CommandCode::SetSourceVolume, |w| {
            source.write(w);
            w.put_cvolume(volume);
            Ok(())
        })
        .map(drop)
    }

    /// Set the volume of a sink input.
    pub fn set_sink_input_volume(&mut self, index: u32, volume: &ChannelVolume) -> Result<()> {
        check_volumes(volume)?;
        self.round_trip(CommandCode::SetSinkInputVolume, |w| {
            w.put_u32(index);
            w.put_cvolume(volume);
            Ok(())
        })
        .map(drop)
    }

    /// Set the volume of a source output.
    pub fn set_source_output_volume(&mut self, index: u32, volume: &ChannelVolume) -> Result<()> {
        check_volumes(volume)?;
        self.round_trip(CommandCode::SetSourceOutputVolume, |w| {
            w.put_u32(index);
            w.put_cvolume(volume);
            Ok(())
        })
        .map(drop)
    }

    /// Mute or unmute a sink.
    pub fn set_sink_mute(&mut self, sink: Target, mute: bool) -> Result<()> {
        self.round_trip(CommandCode::SetSinkMute, |w| {
            sink.write(w);
            w.put_bool(mute);
            Ok(())
        })
        .map(drop)
    }

    /// Mute or unmute a source.
    pub fn set_source_mute(&mut self, source: Target, mute: bool) -> Result<()> {
        self.round_trip(CommandCode::SetSourceMute, |w| {
            source.write(w);
            w.put_bool(mute);
            Ok(())
        })
        .map(drop)
    }

    /// Mute or unmute a sink input.
    pub fn set_sink_input_mute(&mut self, index: u32, mute: bool) -> Result<()> {
        self.round_trip(CommandCode::SetSinkInputMute, |w| {
            w.put_u32(index);
            w.put_bool(mute);
            Ok(())
        })
        .map(drop)
    }

    /// Mute or unmute a source output.
    pub fn set_source_output_mute(&mut self, index: u32, mute: bool) -> Result<()> {
        self.round_trip(CommandCode::SetSourceOutputMute, |w| {
            w.put_u32(index);
            w.put_bool(mute);
            Ok(())
        })
        .map(drop)
    }

    /// Make a sink the default.
    pub fn set_default_sink(&mut self, name: &str) -> Result<()> {
        self.round_trip(CommandCode::SetDefaultSink, |w| {
            w.put_string(Some(name));
            Ok(())
        })
        .map(drop)
    }

    /// Make a source the default.
    pub fn set_default_source(&mut self, name: &str) -> Result<()> {
        self.round_trip(CommandCode::SetDefaultSource, |w| {
            w.put_string(Some(name));
            Ok(())
        })
        .map(drop)
    }

    /// Load a module; returns its index.
    pub fn load_module(&mut self, name: &str, args: &ModuleArgs) -> Result<u32> {
        if name.is_empty() {
            return Err(ClientError::InvalidArgument("module name must not be empty"));
        }
        let argument = args.render();
        let body = self.round_trip(CommandCode::LoadModule, |w| {
            w.put_string(Some(name));
            w.put_string(Some(&argument));
            Ok(())
        })?;
        TagReader::new(&body).get_u32()
            .map_err(Into::into)
    }

    /// Unload a module by index.
    pub fn unload_module(&mut self, index: u32) -> Result<()> {
        self.round_trip(CommandCode::UnloadModule, |w| {
            w.put_u32(index);
            Ok(())
        })
        .map(drop)
    }

    /// Play a cached sample on a sink; returns the sink-input index.
    pub fn play_sample(
        &mut self,
        name: &str,
        sink: Target,
        volume: Volume,
        props: &Props,
    ) -> Result<u32> {
        if name.is_empty() {
            return Err(ClientError::InvalidArgument("sample name must not be empty"));
        }
        let body = self.round_trip(CommandCode::PlaySample, |w| {
            sink.write(w);
            w.put_u32(volume.0);
            w.put_string(Some(name));
            w.put_props(props);
            Ok(())
        })?;
        TagReader::new(&body).get_u32().map_err(Into::into)
    }

    /// Remove a cached sample.
    pub fn remove_sample(&mut self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(ClientError::InvalidArgument("sample name must not be empty"));
        }
        self.round_trip(CommandCode::RemoveSample, |w| {
            w.put_string(Some(name));
            Ok(())
        })
        .map(drop)
    }

    /// Resolve a sink name to its index.
    pub fn lookup_sink(&mut self, name: &str) -> Result<u32> {
        let body = self.round_trip(CommandCode::LookupSink, |w| {
            w.put_string(Some(name));
            Ok(())
        })?;
        TagReader::new(&body).get_u32().map_err(Into::into)
    }

    /// Resolve a source name to its index.
    pub fn lookup_source(&mut self, name: &str) -> Result<u32> {
        let body = self.round_trip(CommandCode::LookupSource, |w| {
            w.put_string(Some(name));
            Ok(())
        })?;
        TagReader::new(&body).get_u32().map_err(Into::into)
    }

    /// Move a live sink input to another sink.
    pub fn move_sink_input(&mut self, index: u32, sink: Target) -> Result<()> {
        self.round_trip(CommandCode::MoveSinkInput, |w| {
            w.put_u32(index);
            sink.write(w);
            Ok(())
        })
        .map(drop)
    }

    /// Move a live source output to another source.
    pub fn move_source_output(&mut self, index: u32, source: Target) -> Result<()> {
        self.round_trip(CommandCode::MoveSourceOutput, |w| {
            w.put_u32(index);
            source.write(w);
            Ok(())
        })
        .map(drop)
    }
}

fn check_volumes(volume: &ChannelVolume) -> Result<()> {
    if volume.volumes().iter().any(|v| !v.is_valid()) {
        return Err(ClientError::InvalidArgument("volume out of range"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_args_render_bare() {
        let args = ModuleArgs::new()
            .int("rate", 48_000)
            .boolean("remix", false);
        assert_eq!(args.render(), "rate=48000 remix=false");
    }

    #[test]
    fn strings_single_quoted_with_escapes() {
        let args = ModuleArgs::new().string("sink_name", "bob's sink");
        assert_eq!(args.render(), "sink_name='bob\\'s sink'");
    }

    #[test]
    fn props_flattened_and_double_quoted() {
        let mut props = Props::new();
        props.set("device.description", "A \"quoted\" name");
        let args = ModuleArgs::new().props("sink_properties", props);
        assert_eq!(
            args.render(),
            "sink_properties=\"device.description=A \\\"quoted\\\" name\""
        );
    }

    #[test]
    fn empty_args_render_empty() {
        assert_eq!(ModuleArgs::new().render(), "");
    }

    #[test]
    fn target_conversions() {
        assert_eq!(Target::from(3), Target::Index(3));
        assert_eq!(Target::from("front"), Target::Name("front".to_string()));
    }
}
