//! Upload streams: pushing a sample into the server's cache.
//!
//! An upload stream is a short-lived outbound stream with its whole credit
//! granted up front: the create reply returns the accepted length, the
//! client ships that many bytes as memory blocks, and FINISH seals the
//! cache entry under the name given at create time.

use std::io::{Read, Write};

use bytes::Bytes;
use pulsewire_proto::{ChannelMap, CommandCode, Props, SampleSpec, TagReader};

use crate::client::Client;
use crate::error::{ClientError, Result};
use crate::playback::PlaybackEngine;

/// Parameters for creating an upload stream.
#[derive(Debug, Clone)]
pub struct UploadParams {
    /// Sample-cache name; must be non-empty.
    pub name: String,
    pub sample_spec: SampleSpec,
    /// Defaults to the WAV mapping for the channel count.
    pub channel_map: Option<ChannelMap>,
    /// Total sample length in bytes; must be frame-aligned.
    pub length: u32,
    pub props: Props,
}

impl UploadParams {
    pub fn new(name: impl Into<String>, sample_spec: SampleSpec, length: u32) -> Self {
        Self {
            name: name.into(),
            sample_spec,
            channel_map: None,
            length,
            props: Props::new(),
        }
    }
}

/// Everything the server reports back from a successful create.
#[derive(Debug, Clone, Copy)]
pub struct CreateUploadReply {
    pub index: u32,
    /// Bytes the server will accept; granted as credit in full.
    pub requested_bytes: u32,
}

/// Handle to a live upload stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadStream {
    pub(crate) index: u32,
}

impl UploadStream {
    /// The server-assigned stream index.
    pub fn index(&self) -> u32 {
        self.index
    }
}

pub(crate) struct UploadState {
    pub(crate) engine: PlaybackEngine,
}

impl<T: Read + Write> Client<T> {
    /// Create an upload stream for a sample-cache entry.
    pub fn create_upload_stream(
        &mut self,
        params: UploadParams,
    ) -> Result<(UploadStream, CreateUploadReply)> {
        if params.name.is_empty() {
            return Err(ClientError::InvalidArgument("sample name must not be empty"));
        }
        let frame_size = params.sample_spec.frame_size();
        if params.length == 0 || params.length as usize % frame_size != 0 {
            return Err(ClientError::InvalidArgument(
                "upload length must be a non-zero multiple of the frame size",
            ));
        }

        let channel_map = match &params.channel_map {
            Some(map) => map.clone(),
            None => ChannelMap::wav_default(params.sample_spec.channels)?,
        };
        let body = self.round_trip(CommandCode::CreateUploadStream, |w| {
            w.put_string(Some(&params.name));
            w.put_sample_spec(&params.sample_spec)?;
            w.put_channel_map(&channel_map);
            w.put_u32(params.length);
            w.put_props(&params.props);
            Ok(())
        })?;
        let mut r = TagReader::new(&body);
        let reply = CreateUploadReply {
            index: r.get_u32()?,
            requested_bytes: r.get_u32()?,
        };

        let mut engine = PlaybackEngine::new(frame_size, Some(u64::from(params.length)));
        engine.grant(reply.requested_bytes);
        self.upload.insert(reply.index, UploadState { engine });

        tracing::debug!(index = reply.index, length = params.length, "upload stream created");
        Ok((UploadStream { index: reply.index }, reply))
    }

    /// Write sample bytes to the upload stream.
    ///
    /// Fails with [`ClientError::MaximumLengthReached`] once the declared
    /// length is exhausted.
    pub fn upload_write(&mut self, stream: UploadStream, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        let state = self
            .upload
            .get_mut(&stream.index)
            .ok_or(ClientError::NoSuchStream {
                index: stream.index,
            })?;
        state.engine.enqueue(Bytes::copy_from_slice(data))?;
        self.ship_upload(stream.index)
    }

    /// Seal the sample-cache entry. The reply means the server has all
    /// buffered data.
    pub fn finish_upload(&mut self, stream: UploadStream) -> Result<()> {
        self.upload
            .get(&stream.index)
            .ok_or(ClientError::NoSuchStream {
                index: stream.index,
            })?;
        self.round_trip(CommandCode::FinishUploadStream, |w| {
            w.put_u32(stream.index);
            Ok(())
        })?;
        self.upload.remove(&stream.index);
        Ok(())
    }

    /// Abandon the upload without sealing the cache entry.
    pub fn delete_upload_stream(&mut self, stream: UploadStream) -> Result<()> {
        self.upload.remove(&stream.index);
        self.delete_stream(CommandCode::DeleteUploadStream, stream.index)
    }
}
