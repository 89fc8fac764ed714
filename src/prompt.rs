use std::io::{self, BufRead, Write};

/// Ask a yes/no question on stderr. End of input counts as the default, or
/// as "no" when there is none.
pub fn prompt_confirm(prompt: &str, default: Option<bool>) -> io::Result<bool> {
    let stdin = io::stdin();
    confirm_from(&mut stdin.lock(), &mut io::stderr(), prompt, default)
}

fn confirm_from<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    prompt: &str,
    default: Option<bool>,
) -> io::Result<bool> {
    let mut line = String::new();

    loop {
        line.clear();

        match default {
            Some(true) => write!(output, "{} (Y/n): ", prompt)?,
            Some(false) | None => write!(output, "{} (y/N): ", prompt)?,
        }
        output.flush()?;

        if input.read_line(&mut line)? == 0 {
            return Ok(default.unwrap_or(false));
        }

        match line.trim().to_uppercase().as_str() {
            "Y" | "YES" => return Ok(true),
            "N" | "NO" => return Ok(false),
            "" => match default {
                Some(default) => return Ok(default),
                None => continue,
            },
            _ => continue,
        }
    }
}

pub fn prompt_password(prompt: &str) -> io::Result<String> {
    rpassword::prompt_password(prompt)
}
