//! `murphi-comment-ls`: enumerates every comment in a Murphi source
//! file, one per line, in the `line.start_col-end_col: text` form
//! required by §4.A. Comments are lexed but otherwise discarded by the
//! rest of the front end, so this tool runs the lexer alone rather
//! than the full compile pipeline.

use rumur::lexer;
use std::path::PathBuf;
use std::process;

fn main() {
    let mut args = std::env::args().skip(1);
    let Some(path) = args.next() else {
        eprintln!("usage: murphi-comment-ls <input.m>");
        process::exit(2);
    };
    let path = PathBuf::from(path);

    let source = match std::fs::read_to_string(&path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("murphi-comment-ls: {}: {e}", path.display());
            process::exit(2);
        }
    };

    let (_tokens, comments) = match lexer::tokenize(&source, 0) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("murphi-comment-ls: {e}");
            process::exit(1);
        }
    };

    for (_, on_line) in comments.by_line.iter() {
        for comment in on_line {
            let loc = comment.loc;
            println!(
                "{}.{}-{}: {}",
                loc.start_line, loc.start_col, loc.end_col, comment.text
            );
        }
    }
}
