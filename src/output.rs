//! Text rendering of filestore records.

use stash_pipeline::Emitter;
use stash_store::{Cid, ListRes, Status};
use std::io::Write;

/// `filestore ls` and `filestore add`: one record per line, messages for
/// failed records on the error stream instead.
pub struct Listing<O, E> {
    out: O,
    err: E,
}

impl<O: Write, E: Write> Listing<O, E> {
    pub fn new(out: O, err: E) -> Self {
        Self { out, err }
    }
}

impl<O: Write, E: Write> Emitter<ListRes> for Listing<O, E> {
    fn emit(&mut self, item: &ListRes) -> std::io::Result<()> {
        writeln!(self.out, "{}", item.format_long())
    }

    fn diagnose(&mut self, _item: &ListRes, message: &str) -> std::io::Result<()> {
        writeln!(self.err, "{message}")
    }
}

/// `filestore verify`: every record gets a status line. Records that don't
/// even have a meaningful status also get their message on the error stream.
pub struct Verification<O, E> {
    out: O,
    err: E,
}

impl<O: Write, E: Write> Verification<O, E> {
    pub fn new(out: O, err: E) -> Self {
        Self { out, err }
    }
}

impl<O: Write, E: Write> Emitter<ListRes> for Verification<O, E> {
    fn emit(&mut self, item: &ListRes) -> std::io::Result<()> {
        writeln!(self.out, "{} {}", item.status, item.format_long())
    }

    fn diagnose(&mut self, item: &ListRes, message: &str) -> std::io::Result<()> {
        if item.status == Status::OtherError {
            writeln!(self.err, "{message}")?;
        }
        self.emit(item)
    }
}

/// `filestore dups`: one key per line.
pub struct Keys<O> {
    out: O,
}

impl<O: Write> Keys<O> {
    pub fn new(out: O) -> Self {
        Self { out }
    }
}

impl<O: Write> Emitter<Cid> for Keys<O> {
    fn emit(&mut self, item: &Cid) -> std::io::Result<()> {
        writeln!(self.out, "{item}")
    }

    fn diagnose(&mut self, item: &Cid, _message: &str) -> std::io::Result<()> {
        self.emit(item)
    }
}
