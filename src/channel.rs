use std::sync::atomic::{AtomicI32, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode, header::CONTENT_TYPE};
use thrift::protocol::{
    TCompactInputProtocol, TCompactOutputProtocol, TFieldIdentifier, TInputProtocol,
    TMessageIdentifier, TMessageType, TOutputProtocol, TStructIdentifier, TType,
    verify_expected_message_type, verify_expected_sequence_number, verify_expected_service_call,
};
use tracing::debug;
use url::Url;

use crate::error::{PictError, Result, RpcError};
use crate::headers::ClientIdentity;

pub const ISSUE_CHANNEL_TOKEN: &str = "issueChannelToken";
const CHANNEL_ROUTE: &str = "CH4";
const THRIFT_CONTENT_TYPE: &str = "application/x-thrift";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelToken {
    pub token: String,
    pub obs_token: String,
    pub expiration: i64,
    pub refresh_token: String,
    pub channel_access_token: String,
}

/// Something that can trade the account's access token for a channel token.
#[async_trait]
pub trait ChannelTokenIssuer: Send + Sync {
    async fn issue_channel_token(&self, channel_id: &str) -> Result<ChannelToken>;
}

/// Serializes an `issueChannelToken(1: string channelId)` call in the compact protocol.
pub fn encode_issue_channel_token(seq_id: i32, channel_id: &str) -> Result<Bytes, RpcError> {
    let mut buf = Vec::new();
    {
        let mut o_prot = TCompactOutputProtocol::new(&mut buf);
        o_prot.write_message_begin(&TMessageIdentifier::new(
            ISSUE_CHANNEL_TOKEN,
            TMessageType::Call,
            seq_id,
        ))?;
        o_prot.write_struct_begin(&TStructIdentifier::new("issueChannelToken_args"))?;
        o_prot.write_field_begin(&TFieldIdentifier::new("channelId", TType::String, 1))?;
        o_prot.write_string(channel_id)?;
        o_prot.write_field_end()?;
        o_prot.write_field_stop()?;
        o_prot.write_struct_end()?;
        o_prot.write_message_end()?;
        o_prot.flush()?;
    }
    Ok(Bytes::from(buf))
}

/// Decodes the reply to the call sent with `seq_id`.
pub fn decode_issue_channel_token(frame: &[u8], seq_id: i32) -> Result<ChannelToken, RpcError> {
    let mut i_prot = TCompactInputProtocol::new(frame);
    let message = i_prot.read_message_begin()?;
    verify_expected_sequence_number(seq_id, message.sequence_number)?;
    verify_expected_service_call(ISSUE_CHANNEL_TOKEN, &message.name)?;

    if message.message_type == TMessageType::Exception {
        let remote = thrift::Error::read_application_error_from_in_protocol(&mut i_prot)?;
        i_prot.read_message_end()?;
        return Err(thrift::Error::Application(remote).into());
    }
    verify_expected_message_type(TMessageType::Reply, message.message_type)?;

    let token = read_result(&mut i_prot)?;
    i_prot.read_message_end()?;
    Ok(token)
}

fn read_result(i_prot: &mut dyn TInputProtocol) -> Result<ChannelToken, RpcError> {
    let mut success = None;

    i_prot.read_struct_begin()?;
    loop {
        let field = i_prot.read_field_begin()?;
        if field.field_type == TType::Stop {
            break;
        }
        match (field.id, field.field_type) {
            (Some(0), TType::Struct) => success = Some(read_channel_token(i_prot)?),
            (Some(1), TType::Struct) => return Err(read_channel_exception(i_prot)?),
            (_, ty) => i_prot.skip(ty)?,
        }
        i_prot.read_field_end()?;
    }
    i_prot.read_struct_end()?;

    success.ok_or_else(|| RpcError::MissingResult {
        method: ISSUE_CHANNEL_TOKEN.to_string(),
    })
}

fn read_channel_token(i_prot: &mut dyn TInputProtocol) -> Result<ChannelToken, RpcError> {
    let mut token = ChannelToken::default();

    i_prot.read_struct_begin()?;
    loop {
        let field = i_prot.read_field_begin()?;
        if field.field_type == TType::Stop {
            break;
        }
        match (field.id, field.field_type) {
            (Some(1), TType::String) => token.token = i_prot.read_string()?,
            (Some(2), TType::String) => token.obs_token = i_prot.read_string()?,
            (Some(3), TType::I64) => token.expiration = i_prot.read_i64()?,
            (Some(4), TType::String) => token.refresh_token = i_prot.read_string()?,
            (Some(5), TType::String) => token.channel_access_token = i_prot.read_string()?,
            (_, ty) => i_prot.skip(ty)?,
        }
        i_prot.read_field_end()?;
    }
    i_prot.read_struct_end()?;

    Ok(token)
}

fn read_channel_exception(i_prot: &mut dyn TInputProtocol) -> Result<RpcError, RpcError> {
    let mut code = 0;
    let mut reason = String::new();

    i_prot.read_struct_begin()?;
    loop {
        let field = i_prot.read_field_begin()?;
        if field.field_type == TType::Stop {
            break;
        }
        match (field.id, field.field_type) {
            (Some(1), TType::I32) => code = i_prot.read_i32()?,
            (Some(2), TType::String) => reason = i_prot.read_string()?,
            (_, ty) => i_prot.skip(ty)?,
        }
        i_prot.read_field_end()?;
    }
    i_prot.read_struct_end()?;

    Ok(RpcError::Channel { code, reason })
}

/// Issues channel tokens by posting Thrift compact-protocol frames to the gateway.
pub struct HttpChannelIssuer {
    client: Client,
    url: Url,
    identity: ClientIdentity,
    access_token: String,
    seq_id: AtomicI32,
}

impl HttpChannelIssuer {
    pub fn new(
        client: Client,
        gateway_base_url: &Url,
        identity: ClientIdentity,
        access_token: String,
    ) -> Result<Self> {
        let url = gateway_base_url.join(CHANNEL_ROUTE).map_err(|e| {
            PictError::InvalidArgument(format!("invalid gateway URL {gateway_base_url}: {e}"))
        })?;

        Ok(Self {
            client,
            url,
            identity,
            access_token,
            seq_id: AtomicI32::new(0),
        })
    }
}

#[async_trait]
impl ChannelTokenIssuer for HttpChannelIssuer {
    async fn issue_channel_token(&self, channel_id: &str) -> Result<ChannelToken> {
        let seq_id = self.seq_id.fetch_add(1, Ordering::Relaxed) + 1;
        let frame = encode_issue_channel_token(seq_id, channel_id)?;

        debug!("Requesting channel token for channel {}", channel_id);
        let response = self
            .client
            .post(self.url.clone())
            .headers(self.identity.access_headers(&self.access_token)?)
            .header(CONTENT_TYPE, THRIFT_CONTENT_TYPE)
            .body(frame)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(RpcError::Transport(status).into());
        }

        let reply = response.bytes().await?;
        Ok(decode_issue_channel_token(&reply, seq_id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thrift::{ApplicationError, ApplicationErrorKind};

    fn frame(
        name: &str,
        message_type: TMessageType,
        seq_id: i32,
        write_body: impl FnOnce(&mut dyn TOutputProtocol) -> thrift::Result<()>,
    ) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut o_prot = TCompactOutputProtocol::new(&mut buf);
            o_prot
                .write_message_begin(&TMessageIdentifier::new(name, message_type, seq_id))
                .unwrap();
            write_body(&mut o_prot).unwrap();
            o_prot.write_message_end().unwrap();
            o_prot.flush().unwrap();
        }
        buf
    }

    fn reply_frame(
        name: &str,
        seq_id: i32,
        write_fields: impl FnOnce(&mut dyn TOutputProtocol) -> thrift::Result<()>,
    ) -> Vec<u8> {
        frame(name, TMessageType::Reply, seq_id, |o_prot| {
            o_prot.write_struct_begin(&TStructIdentifier::new("issueChannelToken_result"))?;
            write_fields(o_prot)?;
            o_prot.write_field_stop()?;
            o_prot.write_struct_end()
        })
    }

    fn token_body(o_prot: &mut dyn TOutputProtocol) -> thrift::Result<()> {
        o_prot.write_field_begin(&TFieldIdentifier::new("success", TType::Struct, 0))?;
        o_prot.write_struct_begin(&TStructIdentifier::new("ChannelToken"))?;
        o_prot.write_field_begin(&TFieldIdentifier::new("token", TType::String, 1))?;
        o_prot.write_string("tok")?;
        o_prot.write_field_end()?;
        o_prot.write_field_begin(&TFieldIdentifier::new("expiration", TType::I64, 3))?;
        o_prot.write_i64(1_700_000_000_000)?;
        o_prot.write_field_end()?;
        o_prot.write_field_begin(&TFieldIdentifier::new("channelAccessToken", TType::String, 5))?;
        o_prot.write_string("channel-access")?;
        o_prot.write_field_end()?;
        o_prot.write_field_begin(&TFieldIdentifier::new("unknown", TType::I32, 9))?;
        o_prot.write_i32(42)?;
        o_prot.write_field_end()?;
        o_prot.write_field_stop()?;
        o_prot.write_struct_end()?;
        o_prot.write_field_end()
    }

    fn application_kind(err: RpcError) -> ApplicationErrorKind {
        match err {
            RpcError::Thrift(thrift::Error::Application(e)) => e.kind,
            other => panic!("expected an application error, got {other:?}"),
        }
    }

    #[test]
    fn test_encode_call() {
        let frame = encode_issue_channel_token(7, "1341209850").unwrap();

        let mut i_prot = TCompactInputProtocol::new(&frame[..]);
        let message = i_prot.read_message_begin().unwrap();
        assert_eq!(message.name, ISSUE_CHANNEL_TOKEN);
        assert_eq!(message.message_type, TMessageType::Call);
        assert_eq!(message.sequence_number, 7);

        i_prot.read_struct_begin().unwrap();
        let field = i_prot.read_field_begin().unwrap();
        assert_eq!((field.id, field.field_type), (Some(1), TType::String));
        assert_eq!(i_prot.read_string().unwrap(), "1341209850");
        i_prot.read_field_end().unwrap();
        assert_eq!(i_prot.read_field_begin().unwrap().field_type, TType::Stop);
    }

    #[test]
    fn test_decode_success() {
        let frame = reply_frame(ISSUE_CHANNEL_TOKEN, 3, token_body);

        let token = decode_issue_channel_token(&frame, 3).unwrap();

        assert_eq!(
            token,
            ChannelToken {
                token: "tok".to_string(),
                obs_token: String::new(),
                expiration: 1_700_000_000_000,
                refresh_token: String::new(),
                channel_access_token: "channel-access".to_string(),
            }
        );
    }

    #[test]
    fn test_decode_channel_exception() {
        let frame = reply_frame(ISSUE_CHANNEL_TOKEN, 1, |o_prot| {
            o_prot.write_field_begin(&TFieldIdentifier::new("e", TType::Struct, 1))?;
            o_prot.write_struct_begin(&TStructIdentifier::new("ChannelException"))?;
            o_prot.write_field_begin(&TFieldIdentifier::new("code", TType::I32, 1))?;
            o_prot.write_i32(2)?;
            o_prot.write_field_end()?;
            o_prot.write_field_begin(&TFieldIdentifier::new("reason", TType::String, 2))?;
            o_prot.write_string("not authorized")?;
            o_prot.write_field_end()?;
            o_prot.write_field_stop()?;
            o_prot.write_struct_end()?;
            o_prot.write_field_end()
        });

        let err = decode_issue_channel_token(&frame, 1).unwrap_err();

        assert!(matches!(
            err,
            RpcError::Channel { code: 2, ref reason } if reason == "not authorized"
        ));
    }

    #[test]
    fn test_decode_application_exception() {
        let frame = frame(ISSUE_CHANNEL_TOKEN, TMessageType::Exception, 1, |o_prot| {
            let error = ApplicationError::new(ApplicationErrorKind::InternalError, "Internal error");
            thrift::Error::write_application_error_to_out_protocol(&error, o_prot)
        });

        let err = decode_issue_channel_token(&frame, 1).unwrap_err();

        match err {
            RpcError::Thrift(thrift::Error::Application(e)) => {
                assert_eq!(e.kind, ApplicationErrorKind::InternalError);
                assert_eq!(e.message, "Internal error");
            }
            other => panic!("expected an application error, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_wrong_method_and_sequence() {
        let wrong_name = reply_frame("getProfile", 1, token_body);
        assert_eq!(
            application_kind(decode_issue_channel_token(&wrong_name, 1).unwrap_err()),
            ApplicationErrorKind::WrongMethodName
        );

        let wrong_seq = reply_frame(ISSUE_CHANNEL_TOKEN, 2, token_body);
        assert_eq!(
            application_kind(decode_issue_channel_token(&wrong_seq, 1).unwrap_err()),
            ApplicationErrorKind::BadSequenceId
        );
    }

    #[test]
    fn test_rejects_call_as_reply() {
        let call = encode_issue_channel_token(1, "1341209850").unwrap();

        assert_eq!(
            application_kind(decode_issue_channel_token(&call, 1).unwrap_err()),
            ApplicationErrorKind::InvalidMessageType
        );
    }

    #[test]
    fn test_empty_result_is_an_error() {
        let frame = reply_frame(ISSUE_CHANNEL_TOKEN, 1, |_| Ok(()));

        let err = decode_issue_channel_token(&frame, 1).unwrap_err();

        assert!(matches!(err, RpcError::MissingResult { .. }));
    }

    #[test]
    fn test_truncated_frame_is_an_error() {
        let frame = reply_frame(ISSUE_CHANNEL_TOKEN, 1, token_body);

        let err = decode_issue_channel_token(&frame[..frame.len() / 2], 1).unwrap_err();

        assert!(matches!(err, RpcError::Thrift(_)));
    }

    #[tokio::test]
    async fn test_http_issuer_posts_frame() {
        let mut server = mockito::Server::new_async().await;
        let reply = reply_frame(ISSUE_CHANNEL_TOKEN, 1, token_body);
        let mock = server
            .mock("POST", "/CH4")
            .match_header("x-line-access", "T")
            .match_header("content-type", THRIFT_CONTENT_TYPE)
            .match_body(encode_issue_channel_token(1, "1341209850").unwrap().to_vec())
            .with_status(200)
            .with_body(reply)
            .create_async()
            .await;

        let base = Url::parse(&server.url()).unwrap();
        let issuer =
            HttpChannelIssuer::new(Client::new(), &base, ClientIdentity::default(), "T".into())
                .unwrap();

        let token = issuer.issue_channel_token("1341209850").await.unwrap();

        assert_eq!(token.channel_access_token, "channel-access");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_http_issuer_transport_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/CH4")
            .with_status(500)
            .create_async()
            .await;

        let base = Url::parse(&server.url()).unwrap();
        let issuer =
            HttpChannelIssuer::new(Client::new(), &base, ClientIdentity::default(), "T".into())
                .unwrap();

        let err = issuer.issue_channel_token("1").await.unwrap_err();

        assert!(matches!(err, PictError::Rpc(RpcError::Transport(_))));
    }
}
