//! ANSI escape stripping for captured terminal output.

use vte::{Params, Parser, Perform};

/// Strip ANSI escape sequences and stray control bytes from raw output.
///
/// Newlines, carriage returns and tabs are kept.
pub fn strip_ansi(input: &[u8]) -> String {
    let mut text = PlainText::default();
    let mut parser = Parser::new();
    parser.advance(&mut text, input);
    String::from_utf8_lossy(&text.output).into_owned()
}

#[derive(Default)]
struct PlainText {
    output: Vec<u8>,
}

impl Perform for PlainText {
    fn print(&mut self, c: char) {
        let mut buf = [0u8; 4];
        self.output
            .extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
    }

    fn execute(&mut self, byte: u8) {
        if matches!(byte, b'\n' | b'\r' | b'\t') {
            self.output.push(byte);
        }
    }

    fn hook(&mut self, _params: &Params, _intermediates: &[u8], _ignore: bool, _action: char) {}

    fn put(&mut self, _byte: u8) {}

    fn unhook(&mut self) {}

    fn osc_dispatch(&mut self, _params: &[&[u8]], _bell_terminated: bool) {}

    fn csi_dispatch(
        &mut self,
        _params: &Params,
        _intermediates: &[u8],
        _ignore: bool,
        _action: char,
    ) {
    }

    fn esc_dispatch(&mut self, _intermediates: &[u8], _ignore: bool, _byte: u8) {}
}
