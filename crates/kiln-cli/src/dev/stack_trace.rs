//! Parsers for the stack traces browsers report over the event channel.
//!
//! Each engine prints frames differently. Lines that match no known frame
//! shape are skipped; an environment without a parser yields `None` so the
//! caller can fall back to the raw text.

use crate::dev::environment::Environment;
use regex::Regex;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    JavaScript,
    WebAssembly,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    pub symbol: String,
    pub location: Option<String>,
    pub kind: FrameKind,
}

impl StackFrame {
    fn new(symbol: &str, location: Option<&str>, kind: FrameKind) -> Self {
        Self {
            symbol: symbol.to_string(),
            location: location.filter(|l| !l.is_empty()).map(str::to_string),
            kind,
        }
    }
}

static CHROME_WEBPACK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"at (.+) \(webpack:///(.+?)\)").expect("valid regex"));
static CHROME_EVAL_WASM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"at (.+) \(<anonymous>:(.+?)\)").expect("valid regex"));
static CHROME_WASM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"at (.+) \((?:wasm://wasm/[^:]+|[^()]+\.wasm):(wasm-function.+?)\)")
        .expect("valid regex")
});
static CHROME_JS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"at (.+) \((.+)\)$").expect("valid regex"));

static FIREFOX_WEBPACK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(.+)@webpack:///(.+)").expect("valid regex"));
static FIREFOX_EVAL_WASM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(.+)@http://127.0.0.1.+WebAssembly.instantiate:(.+)").expect("valid regex")
});
static FIREFOX_WASM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(.+)@.+?:(wasm-function\[.+)").expect("valid regex"));
static FIREFOX_JS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*)@(.+)$").expect("valid regex"));

static SAFARI_WASM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<\?>\.wasm-function\[(.+)\]@\[wasm code\]").expect("valid regex")
});
static SAFARI_JS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(.+?)(?:@(?:\[(?:native|wasm) code\]|(.+)))?$").expect("valid regex")
});

/// Parse `raw` with the parser for `environment`.
pub fn parse(raw: &str, environment: Environment) -> Option<Vec<StackFrame>> {
    match environment {
        Environment::Chrome | Environment::Edge => Some(parse_chrome(raw)),
        Environment::Firefox => Some(parse_firefox(raw)),
        Environment::Safari => Some(parse_safari(raw)),
        Environment::Other => None,
    }
}

fn capture<'a>(regex: &Regex, line: &'a str) -> Option<(&'a str, Option<&'a str>)> {
    let caps = regex.captures(line)?;
    let symbol = caps.get(1)?.as_str();
    Some((symbol, caps.get(2).map(|m| m.as_str())))
}

/// The first line of a V8 trace is the error message.
fn parse_chrome(raw: &str) -> Vec<StackFrame> {
    raw.lines()
        .skip(1)
        .map(str::trim)
        .filter_map(|line| {
            if let Some((symbol, location)) = capture(&CHROME_WEBPACK, line) {
                Some(StackFrame::new(symbol, location, FrameKind::JavaScript))
            } else if let Some((symbol, location)) = capture(&CHROME_EVAL_WASM, line)
                .or_else(|| capture(&CHROME_WASM, line))
            {
                Some(StackFrame::new(symbol, location, FrameKind::WebAssembly))
            } else {
                capture(&CHROME_JS, line)
                    .map(|(symbol, location)| StackFrame::new(symbol, location, FrameKind::JavaScript))
            }
        })
        .collect()
}

fn parse_firefox(raw: &str) -> Vec<StackFrame> {
    raw.lines()
        .filter_map(|line| {
            if let Some((symbol, location)) = capture(&FIREFOX_WEBPACK, line) {
                Some(StackFrame::new(symbol, location, FrameKind::JavaScript))
            } else if let Some((symbol, location)) = capture(&FIREFOX_EVAL_WASM, line)
                .or_else(|| capture(&FIREFOX_WASM, line))
            {
                Some(StackFrame::new(symbol, location, FrameKind::WebAssembly))
            } else {
                capture(&FIREFOX_JS, line)
                    .map(|(symbol, location)| StackFrame::new(symbol, location, FrameKind::JavaScript))
            }
        })
        .collect()
}

fn parse_safari(raw: &str) -> Vec<StackFrame> {
    raw.lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            if let Some((symbol, _)) = capture(&SAFARI_WASM, line) {
                Some(StackFrame::new(symbol, None, FrameKind::WebAssembly))
            } else {
                capture(&SAFARI_JS, line)
                    .map(|(symbol, location)| StackFrame::new(symbol, location, FrameKind::JavaScript))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(symbol: &str, location: Option<&str>, kind: FrameKind) -> StackFrame {
        StackFrame::new(symbol, location, kind)
    }

    #[test]
    fn firefox_webpack_and_eval_frames() {
        let raw = "\
wasmFs.fs.writeSync@webpack:///./entrypoint/dev.js?:35:21
a/this.wasiImport.fd_write</<@webpack:///./node_modules/@wasmer/wasi/lib/index.esm.js?:115:429
write@http://127.0.0.1:8080/dev.js line 97 > eval line 58 > WebAssembly.instantiate:wasm-function[62062]:0x12af331
_call_host_function@http://127.0.0.1:8080/dev.js line 97 > eval line 58 > WebAssembly.instantiate:wasm-function[1388]:0x814d3";

        let frames = parse(raw, Environment::Firefox).unwrap();
        assert_eq!(
            frames,
            vec![
                frame(
                    "wasmFs.fs.writeSync",
                    Some("./entrypoint/dev.js?:35:21"),
                    FrameKind::JavaScript
                ),
                frame(
                    "a/this.wasiImport.fd_write</<",
                    Some("./node_modules/@wasmer/wasi/lib/index.esm.js?:115:429"),
                    FrameKind::JavaScript
                ),
                frame(
                    "write",
                    Some("wasm-function[62062]:0x12af331"),
                    FrameKind::WebAssembly
                ),
                frame(
                    "_call_host_function",
                    Some("wasm-function[1388]:0x814d3"),
                    FrameKind::WebAssembly
                ),
            ]
        );
    }

    #[test]
    fn firefox_module_wasm_frames() {
        let raw = "app::main@http://127.0.0.1:8080/main.wasm:wasm-function[12]:0x1a2b";
        let frames = parse(raw, Environment::Firefox).unwrap();
        assert_eq!(
            frames,
            vec![frame(
                "app::main",
                Some("wasm-function[12]:0x1a2b"),
                FrameKind::WebAssembly
            )]
        );
    }

    #[test]
    fn chrome_skips_message_line() {
        let raw = "\
RuntimeError: unreachable
    at app::panic (wasm://wasm/00a1b2c3:wasm-function[87]:0x4f21)
    at __wbg_run (<anonymous>:wasm-function[3]:0x10)
    at start (http://127.0.0.1:8080/dev.js:42:7)
    at render (webpack:///./src/index.js?:10:3)";

        let frames = parse(raw, Environment::Chrome).unwrap();
        assert_eq!(
            frames,
            vec![
                frame(
                    "app::panic",
                    Some("wasm-function[87]:0x4f21"),
                    FrameKind::WebAssembly
                ),
                frame(
                    "__wbg_run",
                    Some("wasm-function[3]:0x10"),
                    FrameKind::WebAssembly
                ),
                frame(
                    "start",
                    Some("http://127.0.0.1:8080/dev.js:42:7"),
                    FrameKind::JavaScript
                ),
                frame(
                    "render",
                    Some("./src/index.js?:10:3"),
                    FrameKind::JavaScript
                ),
            ]
        );
    }

    #[test]
    fn edge_uses_chrome_format() {
        let raw = "Error\n    at render (webpack:///./src/index.js?:10:3)";
        assert_eq!(parse(raw, Environment::Edge).unwrap().len(), 1);
    }

    #[test]
    fn safari_frames() {
        let raw = "\
<?>.wasm-function[app::main]@[wasm code]
wasm-stub@[wasm code]
start@http://127.0.0.1:8080/dev.js:42:7
global code";

        let frames = parse(raw, Environment::Safari).unwrap();
        assert_eq!(
            frames,
            vec![
                frame("app::main", None, FrameKind::WebAssembly),
                frame("wasm-stub", None, FrameKind::JavaScript),
                frame(
                    "start",
                    Some("http://127.0.0.1:8080/dev.js:42:7"),
                    FrameKind::JavaScript
                ),
                frame("global code", None, FrameKind::JavaScript),
            ]
        );
    }

    #[test]
    fn unknown_environment_has_no_parser() {
        assert!(parse("anything", Environment::Other).is_none());
    }
}
