// Impass — Terminal interaction
//
// Everything the CLI asks the user goes through `Terminal`, so command
// handlers can be driven from tests with scripted answers.

use std::io::{self, BufRead, Read, Write};

use zeroize::Zeroizing;

pub trait Terminal {
    /// Ask for one line of visible input, without the trailing newline.
    /// An empty answer yields `default` when one is given.
    fn read_line(&mut self, prompt: &str, default: Option<&str>) -> io::Result<String>;

    /// Ask for a secret without echoing it.
    fn read_secret(&mut self, prompt: &str) -> io::Result<Zeroizing<String>>;

    /// Everything remaining on standard input.
    fn read_stdin(&mut self) -> io::Result<String>;
}

/// The controlling terminal and standard input.
#[derive(Debug, Default)]
pub struct Tty;

impl Terminal for Tty {
    fn read_line(&mut self, prompt: &str, default: Option<&str>) -> io::Result<String> {
        let mut stderr = io::stderr();
        match default {
            Some(d) => write!(stderr, "{}[{}] ", prompt, d)?,
            None => write!(stderr, "{}", prompt)?,
        }
        stderr.flush()?;

        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "no input"));
        }
        let line = line.trim_end_matches(['\r', '\n']);

        Ok(match default {
            Some(d) if line.is_empty() => d.to_string(),
            _ => line.to_string(),
        })
    }

    fn read_secret(&mut self, prompt: &str) -> io::Result<Zeroizing<String>> {
        rpassword::prompt_password(prompt).map(Zeroizing::new)
    }

    fn read_stdin(&mut self) -> io::Result<String> {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        Ok(buf)
    }
}

// ─── Scripted Terminal for Testing ───────────────────────────────────────────
