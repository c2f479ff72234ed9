//! Wire encodings used for device responses and upstream forwarding.

mod http_frame;
mod multipart;

pub use http_frame::{frame_http_response, http_date};
pub use multipart::{
    boundary_from_content_type, decode, decode_with_boundary, encode, multipart_content_type,
    MultipartPart, MSGPACK_CONTENT_TYPE, MULTIPART_BOUNDARY,
};
