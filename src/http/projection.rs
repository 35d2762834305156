//! Wire representations of the stored entities.
//!
//! Outbound types are plain `Serialize` structs built from domain values.
//! Inbound payloads are read field by field from a JSON object so that
//! read-only fields (`id`, `author`, `pub_date`, `created`, `post`, `user`)
//! are ignored no matter what the client sends.

use serde::Serialize;
use serde_json::{Map, Value};
use time::OffsetDateTime;

use crate::app::media::{decode_data_uri, DecodedImage};
use crate::domain::comment::Comment;
use crate::domain::follow::Follow;
use crate::domain::group::Group;
use crate::domain::post::Post;
use crate::http::error::{AppError, FieldErrors};
use crate::http::links::Links;

const REQUIRED: &str = "This field is required.";
const NOT_NULL: &str = "This field may not be null.";
const NOT_BLANK: &str = "This field may not be blank.";
const NOT_STRING: &str = "Not a valid string.";

pub type Payload = Map<String, Value>;

#[derive(Debug, Serialize)]
pub struct PostWire {
    pub id: i64,
    pub text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub pub_date: OffsetDateTime,
    pub image: Option<String>,
    pub author: String,
    pub group: Option<i64>,
}

impl PostWire {
    pub fn project(post: Post, links: &Links) -> Self {
        Self {
            id: post.id,
            text: post.text,
            pub_date: post.pub_date,
            image: post.image.as_deref().map(|key| links.media_url(key)),
            author: post.author,
            group: post.group_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CommentWire {
    pub id: i64,
    pub text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created: OffsetDateTime,
    pub author: String,
    pub post: i64,
}

impl From<Comment> for CommentWire {
    fn from(comment: Comment) -> Self {
        Self {
            id: comment.id,
            text: comment.text,
            created: comment.created,
            author: comment.author,
            post: comment.post_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GroupWire {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub slug: Option<String>,
}

impl From<Group> for GroupWire {
    fn from(group: Group) -> Self {
        Self {
            id: group.id,
            title: group.title,
            description: group.description,
            slug: group.slug,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FollowWire {
    pub user: String,
    pub following: String,
}

impl From<Follow> for FollowWire {
    fn from(follow: Follow) -> Self {
        Self {
            user: follow.user,
            following: follow.following,
        }
    }
}

/// Parses a request body as a JSON object. An empty body is an empty object.
pub fn parse_object(body: &[u8]) -> Result<Payload, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Payload::new());
    }

    let value: Value = serde_json::from_slice(body)
        .map_err(|err| AppError::bad_request(format!("JSON parse error - {}", err)))?;

    match value {
        Value::Object(map) => Ok(map),
        other => Err(AppError::field(
            "non_field_errors",
            format!(
                "Invalid data. Expected a dictionary, but got {}.",
                type_name(&other)
            ),
        )),
    }
}

#[derive(Debug)]
pub enum ImageInput {
    Clear,
    Upload(DecodedImage),
}

#[derive(Debug, Default)]
pub struct PostInput {
    pub text: Option<String>,
    pub group: Option<Option<i64>>,
    pub image: Option<ImageInput>,
}

/// Reads the writable post fields. With `partial` unset every required
/// field must be present.
pub fn post_from_wire(payload: &Payload, partial: bool) -> Result<PostInput, FieldErrors> {
    let mut errors = FieldErrors::new();

    let text = text_field(payload, "text", !partial, &mut errors);

    let group = match payload.get("group") {
        None => None,
        Some(Value::Null) => Some(None),
        Some(value) => match primary_key(value) {
            Ok(id) => Some(Some(id)),
            Err(message) => {
                errors.add("group", message);
                None
            }
        },
    };

    let image = match payload.get("image") {
        None => None,
        Some(Value::Null) => Some(ImageInput::Clear),
        Some(Value::String(value)) if value.is_empty() => Some(ImageInput::Clear),
        Some(Value::String(value)) => match decode_data_uri(value) {
            Ok(image) => Some(ImageInput::Upload(image)),
            Err(rejection) => {
                errors.add("image", rejection.to_string());
                None
            }
        },
        Some(_) => {
            errors.add(
                "image",
                "The submitted data was not a file. Check the encoding type on the form.",
            );
            None
        }
    };

    if !errors.is_empty() {
        return Err(errors);
    }
    Ok(PostInput { text, group, image })
}

/// Reads the comment text; `None` only when `partial` and absent.
pub fn comment_from_wire(payload: &Payload, partial: bool) -> Result<Option<String>, FieldErrors> {
    let mut errors = FieldErrors::new();
    let text = text_field(payload, "text", !partial, &mut errors);
    if !errors.is_empty() {
        return Err(errors);
    }
    Ok(text)
}

/// Reads the username to follow.
pub fn follow_from_wire(payload: &Payload) -> Result<String, FieldErrors> {
    match payload.get("following") {
        None => Err(FieldErrors::single("following", REQUIRED)),
        Some(Value::Null) => Err(FieldErrors::single("following", NOT_NULL)),
        Some(Value::String(username)) => Ok(username.clone()),
        Some(Value::Number(number)) => Ok(number.to_string()),
        Some(_) => Err(FieldErrors::single("following", "Invalid value.")),
    }
}

pub fn invalid_group(group_id: i64) -> FieldErrors {
    FieldErrors::single(
        "group",
        format!("Invalid pk \"{}\" - object does not exist.", group_id),
    )
}

fn text_field(
    payload: &Payload,
    name: &str,
    required: bool,
    errors: &mut FieldErrors,
) -> Option<String> {
    string_field(payload, name, required, true, errors)
}

/// Reads a non-blank string field, recording any problem in `errors`.
/// Numbers are accepted in their JSON spelling.
pub fn string_field(
    payload: &Payload,
    name: &str,
    required: bool,
    trim: bool,
    errors: &mut FieldErrors,
) -> Option<String> {
    let raw = match payload.get(name) {
        None => {
            if required {
                errors.add(name, REQUIRED);
            }
            return None;
        }
        Some(Value::Null) => {
            errors.add(name, NOT_NULL);
            return None;
        }
        Some(Value::String(value)) => value.clone(),
        Some(Value::Number(number)) => number.to_string(),
        Some(_) => {
            errors.add(name, NOT_STRING);
            return None;
        }
    };

    let value = if trim { raw.trim().to_string() } else { raw };
    if value.trim().is_empty() {
        errors.add(name, NOT_BLANK);
        return None;
    }
    Some(value)
}

fn primary_key(value: &Value) -> Result<i64, String> {
    let parsed = match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| {
        format!(
            "Incorrect type. Expected pk value, received {}.",
            type_name(value)
        )
    })
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "NoneType",
        Value::Bool(_) => "bool",
        Value::Number(number) if number.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}
