//! Introspection: server, sink, source, stream, client and module records.
//!
//! Reply fields are read in the server's fixed order. On protocol >= 32
//! every version-gated field is unconditionally present, so all fields here
//! are mandatory and a short read surfaces as a protocol error. List
//! replies carry records back to back; the end-of-list test is an
//! exhausted reader.

use std::io::{Read, Write};

use bytes::Bytes;
use pulsewire_proto::{
    ChannelMap, ChannelVolume, CommandCode, FormatInfo, Props, SampleSpec, TagReader, Volume,
};

use crate::client::Client;
use crate::commands::Target;
use crate::error::Result;

/// The GET_SERVER_INFO reply.
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub package_name: Option<String>,
    pub package_version: Option<String>,
    pub user_name: Option<String>,
    pub host_name: Option<String>,
    pub sample_spec: SampleSpec,
    pub default_sink_name: Option<String>,
    pub default_source_name: Option<String>,
    pub cookie: u32,
    pub channel_map: ChannelMap,
}

impl ServerInfo {
    fn parse(r: &mut TagReader<'_>) -> Result<Self> {
        Ok(Self {
            package_name: r.get_string()?,
            package_version: r.get_string()?,
            user_name: r.get_string()?,
            host_name: r.get_string()?,
            sample_spec: r.get_sample_spec()?,
            default_sink_name: r.get_string()?,
            default_source_name: r.get_string()?,
            cookie: r.get_u32()?,
            channel_map: r.get_channel_map()?,
        })
    }
}

/// The STAT reply: memory-block counters.
#[derive(Debug, Clone, Copy)]
pub struct StatInfo {
    /// Currently allocated memory blocks.
    pub memblock_count: u32,
    /// Current total size of allocated memory blocks.
    pub memblock_size: u32,
    /// Memory blocks allocated over the server's lifetime.
    pub memblock_count_total: u32,
    /// Total size of memory blocks allocated over the lifetime.
    pub memblock_size_total: u32,
    /// Total size of the sample cache.
    pub sample_cache_size: u32,
}

impl StatInfo {
    fn parse(r: &mut TagReader<'_>) -> Result<Self> {
        Ok(Self {
            memblock_count: r.get_u32()?,
            memblock_size: r.get_u32()?,
            memblock_count_total: r.get_u32()?,
            memblock_size_total: r.get_u32()?,
            sample_cache_size: r.get_u32()?,
        })
    }
}

/// One port of a sink or source.
#[derive(Debug, Clone)]
pub struct PortInfo {
    pub name: Option<String>,
    pub description: Option<String>,
    pub priority: u32,
    pub available: u32,
}

/// A sink record.
#[derive(Debug, Clone)]
pub struct SinkInfo {
    pub index: u32,
    pub name: Option<String>,
    pub description: Option<String>,
    pub sample_spec: SampleSpec,
    pub channel_map: ChannelMap,
    pub owner_module: Option<u32>,
    pub volume: ChannelVolume,
    pub mute: bool,
    pub monitor_source: Option<u32>,
    pub monitor_source_name: Option<String>,
    pub latency_usec: u64,
    pub driver: Option<String>,
    pub flags: u32,
    pub props: Props,
    pub requested_latency_usec: u64,
    pub base_volume: Volume,
    pub state: u32,
    pub volume_steps: u32,
    pub card: Option<u32>,
    pub ports: Vec<PortInfo>,
    pub active_port: Option<String>,
    pub formats: Vec<FormatInfo>,
}

impl SinkInfo {
    fn parse(r: &mut TagReader<'_>) -> Result<Self> {
        let index = r.get_u32()?;
        let name = r.get_string()?;
        let description = r.get_string()?;
        let sample_spec = r.get_sample_spec()?;
        let channel_map = r.get_channel_map()?;
        let owner_module = r.get_index()?;
        let volume = r.get_cvolume()?;
        let mute = r.get_bool()?;
        let monitor_source = r.get_index()?;
        let monitor_source_name = r.get_string()?;
        let latency_usec = r.get_usec()?;
        let driver = r.get_string()?;
        let flags = r.get_u32()?;
        let props = r.get_props()?;
        let requested_latency_usec = r.get_usec()?;
        let base_volume = r.get_volume()?;
        let state = r.get_u32()?;
        let volume_steps = r.get_u32()?;
        let card = r.get_index()?;
        let ports = parse_ports(r)?;
        let active_port = r.get_string()?;
        let formats = parse_formats(r)?;
        Ok(Self {
            index,
            name,
            description,
            sample_spec,
            channel_map,
            owner_module,
            volume,
            mute,
            monitor_source,
            monitor_source_name,
            latency_usec,
            driver,
            flags,
            props,
            requested_latency_usec,
            base_volume,
            state,
            volume_steps,
            card,
            ports,
            active_port,
            formats,
        })
    }
}

/// A source record. Same layout as a sink; the monitor fields point the
/// other way.
#[derive(Debug, Clone)]
pub struct SourceInfo {
    pub index: u32,
    pub name: Option<String>,
    pub description: Option<String>,
    pub sample_spec: SampleSpec,
    pub channel_map: ChannelMap,
    pub owner_module: Option<u32>,
    pub volume: ChannelVolume,
    pub mute: bool,
    pub monitor_of_sink: Option<u32>,
    pub monitor_of_sink_name: Option<String>,
    pub latency_usec: u64,
    pub driver: Option<String>,
    pub flags: u32,
    pub props: Props,
    pub requested_latency_usec: u64,
    pub base_volume: Volume,
    pub state: u32,
    pub volume_steps: u32,
    pub card: Option<u32>,
    pub ports: Vec<PortInfo>,
    pub active_port: Option<String>,
    pub formats: Vec<FormatInfo>,
}

impl SourceInfo {
    fn parse(r: &mut TagReader<'_>) -> Result<Self> {
        let index = r.get_u32()?;
        let name = r.get_string()?;
        let description = r.get_string()?;
        let sample_spec = r.get_sample_spec()?;
        let channel_map = r.get_channel_map()?;
        let owner_module = r.get_index()?;
        let volume = r.get_cvolume()?;
        let mute = r.get_bool()?;
        let monitor_of_sink = r.get_index()?;
        let monitor_of_sink_name = r.get_string()?;
        let latency_usec = r.get_usec()?;
        let driver = r.get_string()?;
        let flags = r.get_u32()?;
        let props = r.get_props()?;
        let requested_latency_usec = r.get_usec()?;
        let base_volume = r.get_volume()?;
        let state = r.get_u32()?;
        let volume_steps = r.get_u32()?;
        let card = r.get_index()?;
        let ports = parse_ports(r)?;
        let active_port = r.get_string()?;
        let formats = parse_formats(r)?;
        Ok(Self {
            index,
            name,
            description,
            sample_spec,
            channel_map,
            owner_module,
            volume,
            mute,
            monitor_of_sink,
            monitor_of_sink_name,
            latency_usec,
            driver,
            flags,
            props,
            requested_latency_usec,
            base_volume,
            state,
            volume_steps,
            card,
            ports,
            active_port,
            formats,
        })
    }
}

/// A sink-input record: one client playback stream on a sink.
#[derive(Debug, Clone)]
pub struct SinkInputInfo {
    pub index: u32,
    pub name: Option<String>,
    pub owner_module: Option<u32>,
    pub client: Option<u32>,
    pub sink: u32,
    pub sample_spec: SampleSpec,
    pub channel_map: ChannelMap,
    pub volume: ChannelVolume,
    pub buffer_usec: u64,
    pub sink_usec: u64,
    pub resample_method: Option<String>,
    pub driver: Option<String>,
    pub mute: bool,
    pub props: Props,
    pub corked: bool,
    pub has_volume: bool,
    pub volume_writable: bool,
    pub format: FormatInfo,
}

impl SinkInputInfo {
    fn parse(r: &mut TagReader<'_>) -> Result<Self> {
        Ok(Self {
            index: r.get_u32()?,
            name: r.get_string()?,
            owner_module: r.get_index()?,
            client: r.get_index()?,
            sink: r.get_u32()?,
            sample_spec: r.get_sample_spec()?,
            channel_map: r.get_channel_map()?,
            volume: r.get_cvolume()?,
            buffer_usec: r.get_usec()?,
            sink_usec: r.get_usec()?,
            resample_method: r.get_string()?,
            driver: r.get_string()?,
            mute: r.get_bool()?,
            props: r.get_props()?,
            corked: r.get_bool()?,
            has_volume: r.get_bool()?,
            volume_writable: r.get_bool()?,
            format: r.get_format_info()?,
        })
    }
}

/// A source-output record: one client record stream on a source.
#[derive(Debug, Clone)]
pub struct SourceOutputInfo {
    pub index: u32,
    pub name: Option<String>,
    pub owner_module: Option<u32>,
    pub client: Option<u32>,
    pub source: u32,
    pub sample_spec: SampleSpec,
    pub channel_map: ChannelMap,
    pub buffer_usec: u64,
    pub source_usec: u64,
    pub resample_method: Option<String>,
    pub driver: Option<String>,
    pub props: Props,
    pub corked: bool,
    pub volume: ChannelVolume,
    pub mute: bool,
    pub has_volume: bool,
    pub volume_writable: bool,
    pub format: FormatInfo,
}

impl SourceOutputInfo {
    fn parse(r: &mut TagReader<'_>) -> Result<Self> {
        Ok(Self {
            index: r.get_u32()?,
            name: r.get_string()?,
            owner_module: r.get_index()?,
            client: r.get_index()?,
            source: r.get_u32()?,
            sample_spec: r.get_sample_spec()?,
            channel_map: r.get_channel_map()?,
            buffer_usec: r.get_usec()?,
            source_usec: r.get_usec()?,
            resample_method: r.get_string()?,
            driver: r.get_string()?,
            props: r.get_props()?,
            corked: r.get_bool()?,
            volume: r.get_cvolume()?,
            mute: r.get_bool()?,
            has_volume: r.get_bool()?,
            volume_writable: r.get_bool()?,
            format: r.get_format_info()?,
        })
    }
}

/// A connected client record.
#[derive(Debug, Clone)]
pub struct ClientInfo {
    pub index: u32,
    pub name: Option<String>,
    pub owner_module: Option<u32>,
    pub driver: Option<String>,
    pub props: Props,
}

impl ClientInfo {
    fn parse(r: &mut TagReader<'_>) -> Result<Self> {
        Ok(Self {
            index: r.get_u32()?,
            name: r.get_string()?,
            owner_module: r.get_index()?,
            driver: r.get_string()?,
            props: r.get_props()?,
        })
    }
}

/// A loaded module record.
#[derive(Debug, Clone)]
pub struct ModuleInfo {
    pub index: u32,
    pub name: Option<String>,
    pub argument: Option<String>,
    pub n_used: Option<u32>,
    pub props: Props,
}

impl ModuleInfo {
    fn parse(r: &mut TagReader<'_>) -> Result<Self> {
        Ok(Self {
            index: r.get_u32()?,
            name: r.get_string()?,
            argument: r.get_string()?,
            n_used: r.get_index()?,
            props: r.get_props()?,
        })
    }
}

fn parse_ports(r: &mut TagReader<'_>) -> Result<Vec<PortInfo>> {
    let count = r.get_u32()?;
    let mut ports = Vec::with_capacity(count.min(64) as usize);
    for _ in 0..count {
        ports.push(PortInfo {
            name: r.get_string()?,
            description: r.get_string()?,
            priority: r.get_u32()?,
            available: r.get_u32()?,
        });
    }
    Ok(ports)
}

fn parse_formats(r: &mut TagReader<'_>) -> Result<Vec<FormatInfo>> {
    let count = r.get_u8()?;
    let mut formats = Vec::with_capacity(count as usize);
    for _ in 0..count {
        formats.push(r.get_format_info()?);
    }
    Ok(formats)
}

/// Parse records back to back until the body is exhausted.
fn parse_list<I>(body: &Bytes, parse: fn(&mut TagReader<'_>) -> Result<I>) -> Result<Vec<I>> {
    let mut r = TagReader::new(body);
    let mut items = Vec::new();
    while !r.is_exhausted() {
        items.push(parse(&mut r)?);
    }
    Ok(items)
}

impl<T: Read + Write> Client<T> {
    /// Fetch server identity and defaults.
    pub fn server_info(&mut self) -> Result<ServerInfo> {
        let body = self.round_trip(CommandCode::GetServerInfo, |_| Ok(()))?;
        ServerInfo::parse(&mut TagReader::new(&body))
    }

    /// Fetch memory-block statistics.
    pub fn stat(&mut self) -> Result<StatInfo> {
        let body = self.round_trip(CommandCode::Stat, |_| Ok(()))?;
        StatInfo::parse(&mut TagReader::new(&body))
    }

    /// Fetch one sink by index or name.
    pub fn sink_info(&mut self, sink: Target) -> Result<SinkInfo> {
        let body = self.round_trip(CommandCode::GetSinkInfo, |w| {
            sink.write(w);
            Ok(())
        })?;
        SinkInfo::parse(&mut TagReader::new(&body))
    }

    /// Fetch all sinks.
    pub fn sink_info_list(&mut self) -> Result<Vec<SinkInfo>> {
        let body = self.round_trip(CommandCode::GetSinkInfoList, |_| Ok(()))?;
        parse_list(&body, SinkInfo::parse)
    }

    /// Fetch one source by index or name.
    pub fn source_info(&mut self, source: Target) -> Result<SourceInfo> {
        let body = self.round_trip(CommandCode::GetSourceInfo, |w| {
            source.write(w);
            Ok(())
        })?;
        SourceInfo::parse(&mut TagReader::new(&body))
    }

    /// Fetch all sources.
    pub fn source_info_list(&mut self) -> Result<Vec<SourceInfo>> {
        let body = self.round_trip(CommandCode::GetSourceInfoList, |_| Ok(()))?;
        parse_list(&body, SourceInfo::parse)
    }

    /// Fetch one sink input by index.
    pub fn sink_input_info(&mut self, index: u32) -> Result<SinkInputInfo> {
        let body = self.round_trip(CommandCode::GetSinkInputInfo, |w| {
            w.put_u32(index);
            Ok(())
        })?;
        SinkInputInfo::parse(&mut TagReader::new(&body))
    }

    /// Fetch all sink inputs.
    pub fn sink_input_info_list(&mut self) -> Result<Vec<SinkInputInfo>> {
        let body = self.round_trip(CommandCode::GetSinkInputInfoList, |_| Ok(()))?;
        parse_list(&body, SinkInputInfo::parse)
    }

    /// Fetch one source output by index.
    pub fn source_output_info(&mut self, index: u32) -> Result<SourceOutputInfo> {
        let body = self.round_trip(CommandCode::GetSourceOutputInfo, |w| {
            w.put_u32(index);
            Ok(())
        })?;
        SourceOutputInfo::parse(&mut TagReader::new(&body))
    }

    /// Fetch all source outputs.
    pub fn source_output_info_list(&mut self) -> Result<Vec<SourceOutputInfo>> {
        let body = self.round_trip(CommandCode::GetSourceOutputInfoList, |_| Ok(()))?;
        parse_list(&body, SourceOutputInfo::parse)
    }

    /// Fetch one connected client by index.
    pub fn client_info(&mut self, index: u32) -> Result<ClientInfo> {
        let body = self.round_trip(CommandCode::GetClientInfo, |w| {
            w.put_u32(index);
            Ok(())
        })?;
        ClientInfo::parse(&mut TagReader::new(&body))
    }

    /// Fetch all connected clients.
    pub fn client_info_list(&mut self) -> Result<Vec<ClientInfo>> {
        let body = self.round_trip(CommandCode::GetClientInfoList, |_| Ok(()))?;
        parse_list(&body, ClientInfo::parse)
    }

    /// Fetch one loaded module by index.
    pub fn module_info(&mut self, index: u32) -> Result<ModuleInfo> {
        let body = self.round_trip(CommandCode::GetModuleInfo, |w| {
            w.put_u32(index);
            Ok(())
        })?;
        ModuleInfo::parse(&mut TagReader::new(&body))
    }

    /// Fetch all loaded modules.
    pub fn module_info_list(&mut self) -> Result<Vec<ModuleInfo>> {
        let body = self.round_trip(CommandCode::GetModuleInfoList, |_| Ok(()))?;
        parse_list(&body, ModuleInfo::parse)
    }
}
