//! ブラウザコンソール向けの tracing 出力

use std::io;

use tracing_subscriber::fmt::MakeWriter;

/// 1 イベント分をバッファし、drop 時にコンソールへ 1 行で出す
pub struct ConsoleWriter {
    buf: Vec<u8>,
}

impl io::Write for ConsoleWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for ConsoleWriter {
    fn drop(&mut self) {
        let line = String::from_utf8_lossy(&self.buf);
        let line = line.trim_end();
        if !line.is_empty() {
            web_sys::console::log_1(&line.into());
        }
    }
}

/// [`ConsoleWriter`] を払い出す
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleMakeWriter;

impl<'a> MakeWriter<'a> for ConsoleMakeWriter {
    type Writer = ConsoleWriter;

    fn make_writer(&'a self) -> Self::Writer {
        ConsoleWriter { buf: Vec::new() }
    }
}

/// グローバル subscriber を設定する
///
/// 2 回目以降の呼び出しは何もしない。wasm32 では `SystemTime` が使えないため
/// タイムスタンプは出さない（コンソール側に付く）。
pub fn install(level: tracing::Level) {
    let result = tracing_subscriber::fmt()
        .with_writer(ConsoleMakeWriter)
        .with_max_level(level)
        .with_target(false)
        .without_time()
        .try_init();
    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
