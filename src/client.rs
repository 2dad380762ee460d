use std::{
    path::{Path, PathBuf},
    str::FromStr,
    time::SystemTime,
};

use bytes::Bytes;
use reqwest::{
    Client, RequestBuilder, StatusCode,
    header::{CONTENT_TYPE, HeaderMap, HeaderValue},
    multipart::{Form, Part},
};
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, info};
use url::Url;

use crate::channel::{ChannelTokenIssuer, HttpChannelIssuer};
use crate::error::{PictError, Result, UploadKind};
use crate::files;
use crate::headers::ClientIdentity;
use crate::obs_params::{ObsParams, object};

pub const DEFAULT_OBS_BASE_URL: &str = "https://obs-sg.line-apps.com";
pub const DEFAULT_OBS_HOME_BASE_URL: &str = "https://obs-jp.line-apps.com";
pub const DEFAULT_GATEWAY_BASE_URL: &str = "https://gd2.line.naver.jp";
pub const DEFAULT_CHANNEL_ID: &str = "1341209850";
pub const DEFAULT_URL_SAVE_AS: &str = "profile.jpg";

const DOWNLOAD_MESSAGE_ROUTE: &str = "talk/m/download.nhn";
const UPLOAD_MESSAGE_ROUTE: &str = "talk/m/upload.nhn";
const UPLOAD_PROFILE_ROUTE: &str = "talk/p/upload.nhn";
const UPLOAD_HOME_ROUTE: &str = "myhome/c/upload.nhn";
const UPDATE_COVER_ROUTE: &str = "mh/api/v39/home/updateCover.json";

const OBS_PARAMS_HEADER: &str = "x-obs-params";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub obs: Url,
    pub obs_home: Url,
    pub gateway: Url,
}

/// The account the client acts for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub mid: String,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoints: Endpoints,
    pub identity: ClientIdentity,
    pub session: Session,
    pub channel_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReturnAs {
    #[default]
    Path,
    Bool,
    Bin,
}

impl FromStr for ReturnAs {
    type Err = PictError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "path" => Ok(ReturnAs::Path),
            "bool" => Ok(ReturnAs::Bool),
            "bin" => Ok(ReturnAs::Bin),
            other => Err(PictError::InvalidArgument(format!(
                "invalid returnAs value '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Downloaded {
    Path(PathBuf),
    Bool(bool),
    Bin(Bytes),
}

/// Where a download lands.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SaveAs {
    #[default]
    TempFile,
    Path(PathBuf),
}

impl From<&str> for SaveAs {
    fn from(value: &str) -> Self {
        if value.is_empty() {
            SaveAs::TempFile
        } else {
            SaveAs::Path(PathBuf::from(value))
        }
    }
}

impl SaveAs {
    fn resolve(self) -> Result<PathBuf> {
        match self {
            SaveAs::TempFile => files::create_temp_file(),
            SaveAs::Path(path) => Ok(path),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Image,
    Video,
    Audio,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Video => "video",
            MediaType::Audio => "audio",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            MediaType::Image => "image/jpeg",
            MediaType::Video => "video/mp4",
            MediaType::Audio => "audio/mp3",
        }
    }
}

impl FromStr for MediaType {
    type Err = PictError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "image" => Ok(MediaType::Image),
            "video" => Ok(MediaType::Video),
            "audio" => Ok(MediaType::Audio),
            other => Err(PictError::InvalidArgument(format!(
                "invalid type value '{other}'"
            ))),
        }
    }
}

/// `p` replaces the still picture, `vp` uploads a video profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProfileKind {
    #[default]
    Picture,
    Video,
}

impl FromStr for ProfileKind {
    type Err = PictError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "p" => Ok(ProfileKind::Picture),
            "vp" => Ok(ProfileKind::Video),
            other => Err(PictError::InvalidArgument(format!(
                "invalid profile type '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ObjectReturn {
    ObjId,
    #[default]
    Bool,
}

impl FromStr for ObjectReturn {
    type Err = PictError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "objId" => Ok(ObjectReturn::ObjId),
            "bool" => Ok(ObjectReturn::Bool),
            other => Err(PictError::InvalidArgument(format!(
                "invalid returnAs value '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadedObject {
    ObjId(String),
    Bool(bool),
}

impl UploadedObject {
    fn new(return_as: ObjectReturn, obj_id: String) -> Self {
        match return_as {
            ObjectReturn::ObjId => UploadedObject::ObjId(obj_id),
            ObjectReturn::Bool => UploadedObject::Bool(true),
        }
    }
}

fn route(base: &Url, route: &str) -> Result<Url> {
    base.join(route)
        .map_err(|e| PictError::InvalidArgument(format!("cannot join {route} onto {base}: {e}")))
}

fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}

fn file_part(path: &Path, contents: Vec<u8>) -> Part {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "file".to_string());
    Part::bytes(contents).file_name(file_name)
}

pub struct ObsClient {
    client: Client,
    endpoints: Endpoints,
    identity: ClientIdentity,
    session: Session,
    channel_id: String,
    issuer: Box<dyn ChannelTokenIssuer>,
    channel_token: OnceCell<String>,
}

impl ObsClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = Client::new();
        let issuer = HttpChannelIssuer::new(
            client.clone(),
            &config.endpoints.gateway,
            config.identity.clone(),
            config.session.access_token.clone(),
        )?;
        Ok(Self::with_issuer(client, config, Box::new(issuer)))
    }

    pub fn with_issuer(
        client: Client,
        config: ClientConfig,
        issuer: Box<dyn ChannelTokenIssuer>,
    ) -> Self {
        Self {
            client,
            endpoints: config.endpoints,
            identity: config.identity,
            session: config.session,
            channel_id: config.channel_id,
            issuer,
            channel_token: OnceCell::new(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    fn access_headers(&self) -> Result<HeaderMap> {
        self.identity.access_headers(&self.session.access_token)
    }

    async fn channel_headers(&self) -> Result<HeaderMap> {
        let channel_token = self.login_channel().await?;
        self.identity
            .channel_headers(&self.session.mid, channel_token)
    }

    /// Channel access token for home endpoints, issued on first use and reused
    /// for the lifetime of the client.
    pub async fn login_channel(&self) -> Result<&str> {
        let token = self
            .channel_token
            .get_or_try_init(|| async {
                let token = self.issuer.issue_channel_token(&self.channel_id).await?;
                info!("Issued channel token for channel {}", self.channel_id);
                Ok::<_, PictError>(token.channel_access_token)
            })
            .await?;
        Ok(token.as_str())
    }

    async fn fetch_to_file(&self, request: RequestBuilder, save_as: SaveAs) -> Result<PathBuf> {
        let response = request.headers(self.access_headers()?).send().await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(PictError::DownloadFailed { status });
        }

        let path = save_as.resolve()?;
        let written = files::save_stream(&path, response.bytes_stream()).await?;
        info!("Downloaded {} bytes to {}", written, path.display());
        Ok(path)
    }

    async fn downloaded(path: PathBuf, return_as: ReturnAs) -> Result<Downloaded> {
        match return_as {
            ReturnAs::Path => Ok(Downloaded::Path(path)),
            ReturnAs::Bool => Ok(Downloaded::Bool(true)),
            ReturnAs::Bin => Ok(Downloaded::Bin(Bytes::from(tokio::fs::read(&path).await?))),
        }
    }

    /// Streams the object attached to `message_id` to disk and returns where it landed.
    pub async fn download_message_to(&self, message_id: &str, save_as: SaveAs) -> Result<PathBuf> {
        let url = route(&self.endpoints.obs, DOWNLOAD_MESSAGE_ROUTE)?;
        debug!("Downloading object of message {}", message_id);
        let request = self.client.get(url).query(&[("oid", message_id)]);
        self.fetch_to_file(request, save_as).await
    }

    pub async fn download_object_msg(
        &self,
        message_id: &str,
        return_as: ReturnAs,
        save_as: SaveAs,
    ) -> Result<Downloaded> {
        let path = self.download_message_to(message_id, save_as).await?;
        Self::downloaded(path, return_as).await
    }

    /// Same as [`Self::download_object_msg`] against an arbitrary URL.
    pub async fn download_file_url(
        &self,
        file_url: &str,
        return_as: ReturnAs,
        save_as: SaveAs,
    ) -> Result<Downloaded> {
        let url = Url::parse(file_url)
            .map_err(|e| PictError::InvalidArgument(format!("invalid URL {file_url}: {e}")))?;
        debug!("Downloading {}", url);
        let path = self.fetch_to_file(self.client.get(url), save_as).await?;
        Self::downloaded(path, return_as).await
    }

    pub async fn update_profile_picture(&self, path: &Path, kind: ProfileKind) -> Result<bool> {
        let contents = tokio::fs::read(path).await?;

        let mut overrides = object([("oid", self.session.mid.as_str()), ("type", "image")]);
        if kind == ProfileKind::Video {
            overrides.extend(object([("ver", "2.0"), ("cat", "vp.mp4")]));
        }
        let params = ObsParams::new(overrides)?.to_json()?;

        let form = Form::new()
            .text("params", params)
            .part("file", file_part(path, contents));

        let response = self
            .client
            .post(route(&self.endpoints.obs, UPLOAD_PROFILE_ROUTE)?)
            .headers(self.access_headers()?)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::CREATED {
            return Err(PictError::UploadFailed {
                kind: UploadKind::ProfilePicture,
                status,
            });
        }

        info!("Profile picture of {} updated", self.session.mid);
        Ok(true)
    }

    /// Uploads a file as the object of an already-sent chat message.
    pub async fn upload_obj_talk(
        &self,
        path: &Path,
        media_type: MediaType,
        obj_id: &str,
    ) -> Result<()> {
        let contents = tokio::fs::read(path).await?;

        let mut overrides = object([
            ("oid", obj_id),
            ("type", media_type.as_str()),
            ("ver", "1.0"),
            ("name", "media"),
        ]);
        overrides.insert("size".to_string(), Value::from(contents.len()));
        let params = ObsParams::new(overrides)?.to_json()?;

        let form = Form::new()
            .text("params", params)
            .part("file", file_part(path, contents));

        let response = self
            .client
            .post(route(&self.endpoints.obs, UPLOAD_MESSAGE_ROUTE)?)
            .headers(self.access_headers()?)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::CREATED {
            return Err(PictError::UploadFailed {
                kind: UploadKind::TalkObject,
                status,
            });
        }
        Ok(())
    }

    pub async fn send_image(&self, path: &Path, object_id: &str) -> Result<()> {
        self.upload_obj_talk(path, MediaType::Image, object_id).await
    }

    /// Uploads raw media to the home (timeline) object store.
    ///
    /// Without `obj_id` the current unix time in seconds is used.
    pub async fn upload_obj_home(
        &self,
        path: &Path,
        media_type: MediaType,
        return_as: ObjectReturn,
        obj_id: Option<String>,
    ) -> Result<UploadedObject> {
        let obj_id = self.upload_home_object(path, media_type, obj_id).await?;
        Ok(UploadedObject::new(return_as, obj_id))
    }

    async fn upload_home_object(
        &self,
        path: &Path,
        media_type: MediaType,
        obj_id: Option<String>,
    ) -> Result<String> {
        let obj_id = obj_id.unwrap_or_else(|| (unix_millis() / 1000).to_string());
        let contents = tokio::fs::read(path).await?;

        let params = ObsParams::new(object([
            ("name", unix_millis().to_string()),
            ("userid", self.session.mid.clone()),
            ("oid", obj_id.clone()),
            ("type", media_type.as_str().to_string()),
            ("ver", "1.0".to_string()),
        ]))?;
        let encoded = HeaderValue::from_str(&params.to_base64()?)
            .map_err(|e| PictError::InvalidArgument(format!("invalid obs params header: {e}")))?;

        let response = self
            .client
            .post(route(&self.endpoints.obs_home, UPLOAD_HOME_ROUTE)?)
            .headers(self.channel_headers().await?)
            .header(CONTENT_TYPE, media_type.content_type())
            .header(OBS_PARAMS_HEADER, encoded)
            .body(contents)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::CREATED {
            return Err(PictError::UploadFailed {
                kind: UploadKind::HomeObject,
                status,
            });
        }

        debug!("Uploaded home object {}", obj_id);
        Ok(obj_id)
    }

    pub async fn update_profile_cover_by_id(&self, obj_id: &str) -> Result<Value> {
        let response = self
            .client
            .get(route(&self.endpoints.gateway, UPDATE_COVER_ROUTE)?)
            .query(&[("coverImageId", obj_id)])
            .headers(self.channel_headers().await?)
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await?;

        Ok(response.json().await?)
    }

    pub async fn update_cover(&self, path: &Path, return_as: ObjectReturn) -> Result<UploadedObject> {
        let obj_id = self
            .upload_home_object(path, MediaType::Image, None)
            .await?;

        let response = self.update_profile_cover_by_id(&obj_id).await?;
        debug!("Cover update response: {}", response);

        Ok(UploadedObject::new(return_as, obj_id))
    }
}
