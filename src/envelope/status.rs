//! Status and method taxonomy shared by every envelope.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Outcome of an API call, carried by every response envelope.
///
/// The numeric codes are part of the public contract and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Ok,
    Invalid,
    Unauthorized,
    Forbidden,
    NotFound,
    Existed,
    Error,
    Redirected,
}

impl Status {
    /// Numeric code associated with this status.
    pub fn code(self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::Invalid => 400,
            Status::Unauthorized => 401,
            Status::Forbidden => 403,
            Status::NotFound => 404,
            Status::Existed => 409,
            Status::Error => 500,
            Status::Redirected => 302,
        }
    }

    /// Map a raw numeric reply code onto a status.
    ///
    /// Used when a reply carries a code but no explicit status:
    /// `>= 500` is an error, the common 4xx codes map to their named
    /// status, any other 4xx is invalid, everything else is ok.
    pub fn from_code(code: u16) -> Self {
        match code {
            500.. => Status::Error,
            404 => Status::NotFound,
            403 => Status::Forbidden,
            401 => Status::Unauthorized,
            400..=499 => Status::Invalid,
            _ => Status::Ok,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::Invalid => "INVALID",
            Status::Unauthorized => "UNAUTHORIZED",
            Status::Forbidden => "FORBIDDEN",
            Status::NotFound => "NOT_FOUND",
            Status::Existed => "EXISTED",
            Status::Error => "ERROR",
            Status::Redirected => "REDIRECTED",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request method understood by every binding.
///
/// `QUERY` is a non-standard read method that carries a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Query,
    Post,
    Put,
    Patch,
    Delete,
    Options,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Query => "QUERY",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Options => "OPTIONS",
        }
    }

    /// Whether an outbound request with this method forwards its content.
    pub fn carries_content(self) -> bool {
        !matches!(self, Method::Get | Method::Delete)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a method name is not part of the supported set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported method: {0}")]
pub struct UnknownMethod(pub String);

impl FromStr for Method {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "QUERY" => Ok(Method::Query),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            "OPTIONS" => Ok(Method::Options),
            _ => Err(UnknownMethod(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_are_fixed() {
        assert_eq!(Status::Ok.code(), 200);
        assert_eq!(Status::Invalid.code(), 400);
        assert_eq!(Status::Unauthorized.code(), 401);
        assert_eq!(Status::Forbidden.code(), 403);
        assert_eq!(Status::NotFound.code(), 404);
        assert_eq!(Status::Existed.code(), 409);
        assert_eq!(Status::Error.code(), 500);
        assert_eq!(Status::Redirected.code(), 302);
    }

    #[test]
    fn test_status_from_code_thresholds() {
        assert_eq!(Status::from_code(503), Status::Error);
        assert_eq!(Status::from_code(500), Status::Error);
        assert_eq!(Status::from_code(404), Status::NotFound);
        assert_eq!(Status::from_code(403), Status::Forbidden);
        assert_eq!(Status::from_code(401), Status::Unauthorized);
        assert_eq!(Status::from_code(409), Status::Invalid);
        assert_eq!(Status::from_code(422), Status::Invalid);
        assert_eq!(Status::from_code(302), Status::Ok);
        assert_eq!(Status::from_code(200), Status::Ok);
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(serde_json::to_string(&Status::NotFound).unwrap(), "\"NOT_FOUND\"");
        let parsed: Status = serde_json::from_str("\"UNAUTHORIZED\"").unwrap();
        assert_eq!(parsed, Status::Unauthorized);
    }

    #[test]
    fn test_method_parsing() {
        assert_eq!("get".parse::<Method>().unwrap(), Method::Get);
        assert_eq!("QUERY".parse::<Method>().unwrap(), Method::Query);
        assert!("TRACE".parse::<Method>().is_err());
        assert!(!Method::Delete.carries_content());
        assert!(Method::Patch.carries_content());
    }
}
