// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Device URI parsing and assembly.
//
// Only the subset of RFC 3986 that device URIs use is handled:
//
//   scheme://[userinfo@]host[:port]/resource[?options]
//
// Host and resource are percent-decoded; userinfo is accepted and dropped.
//
// Hand-rolled: `usb://make/model` puts free text in the host position and
// `file:///` has an empty authority, and both must decode byte-exactly
// against what `assemble_usb_uri` produced.

/// Default port for `socket://` URIs without one (AppSocket / JetDirect).
pub const DEFAULT_SOCKET_PORT: u16 = 9100;

/// A parsed device URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceUri {
    /// Lower-case scheme (`file`, `socket`, `usb`).
    pub scheme: String,
    /// Decoded host (the make, for `usb`).
    pub host: String,
    /// Explicit port, if the authority carried one.
    pub port: Option<u16>,
    /// Decoded resource path without the option string.
    pub resource: String,
    /// Raw option string after `?`, if any.
    pub options: Option<String>,
}

impl DeviceUri {
    /// Split `uri` into its parts.
    ///
    /// The error string is the reason only; callers wrap it together with
    /// the offending URI.
    pub fn parse(uri: &str) -> Result<Self, String> {
        if uri.is_empty() {
            return Err("empty URI".into());
        }

        let (scheme, rest) = uri
            .split_once("://")
            .ok_or_else(|| "missing scheme separator".to_string())?;

        if scheme.is_empty()
            || !scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        {
            return Err(format!("bad scheme name '{scheme}'"));
        }

        let authority_end = rest.find(['/', '?']).unwrap_or(rest.len());
        let (authority, tail) = rest.split_at(authority_end);

        // Userinfo is never used for devices.
        let hostport = authority.rsplit_once('@').map_or(authority, |(_, h)| h);

        let (raw_host, port) = split_port(hostport)?;
        let host = percent_decode(raw_host)?;

        let (raw_resource, options) = match tail.split_once('?') {
            Some((path, opts)) => (path, Some(opts.to_string())),
            None => (tail, None),
        };
        let resource = if raw_resource.is_empty() {
            "/".to_string()
        } else {
            percent_decode(raw_resource)?
        };

        Ok(Self {
            scheme: scheme.to_ascii_lowercase(),
            host,
            port,
            resource,
            options,
        })
    }

    /// Look up `name` in the `key=value&key=value` option string.
    pub fn option(&self, name: &str) -> Option<String> {
        self.options.as_deref()?.split('&').find_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (key == name).then(|| percent_decode(value).unwrap_or_else(|_| value.to_string()))
        })
    }
}

/// Split `host[:port]`, honouring bracketed IPv6 literals.
fn split_port(hostport: &str) -> Result<(&str, Option<u16>), String> {
    if let Some(inner) = hostport.strip_prefix('[') {
        let (host, after) = inner
            .split_once(']')
            .ok_or_else(|| "unterminated IPv6 address".to_string())?;
        return match after.strip_prefix(':') {
            Some(port) => Ok((host, Some(parse_port(port)?))),
            None if after.is_empty() => Ok((host, None)),
            None => Err("garbage after IPv6 address".into()),
        };
    }

    match hostport.rsplit_once(':') {
        Some((host, port)) => Ok((host, Some(parse_port(port)?))),
        None => Ok((hostport, None)),
    }
}

fn parse_port(port: &str) -> Result<u16, String> {
    port.parse::<u16>()
        .map_err(|_| format!("bad port number '{port}'"))
}

/// Decode `%XX` escapes.
pub fn percent_decode(s: &str) -> Result<String, String> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes
                .get(i + 1..i + 3)
                .and_then(|h| std::str::from_utf8(h).ok())
                .and_then(|h| u8::from_str_radix(h, 16).ok())
                .ok_or_else(|| format!("bad percent escape in '{s}'"))?;
            out.push(hex);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).map_err(|_| format!("percent escapes in '{s}' are not UTF-8"))
}

/// Encode everything outside the RFC 3986 unreserved set.
pub fn percent_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~') {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

/// Build `usb://<make>/<model>[?serial=<serial>]` with every part encoded.
pub fn assemble_usb_uri(make: &str, model: &str, serial: Option<&str>) -> String {
    let mut uri = format!("usb://{}/{}", percent_encode(make), percent_encode(model));
    if let Some(serial) = serial {
        uri.push_str("?serial=");
        uri.push_str(&percent_encode(serial));
    }
    uri
}
