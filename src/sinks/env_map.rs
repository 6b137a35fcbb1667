//! Ordered `KEY=value` document that round-trips unrelated lines verbatim.

#[derive(Debug, Clone, PartialEq, Eq)]
enum EnvLine {
    /// Raw line including its terminator.
    Entry { key: String, raw: String },
    Other(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvMap {
    lines: Vec<EnvLine>,
}

impl EnvMap {
    pub fn parse(content: &str) -> Self {
        let lines = content
            .split_inclusive('\n')
            .map(|raw| match parse_key(raw) {
                Some(key) => EnvLine::Entry {
                    key: key.to_owned(),
                    raw: raw.to_owned(),
                },
                None => EnvLine::Other(raw.to_owned()),
            })
            .collect();
        Self { lines }
    }

    /// Value of the first entry with `key`, unquoted.
    pub fn get(&self, key: &str) -> Option<String> {
        self.lines.iter().find_map(|line| match line {
            EnvLine::Entry { key: k, raw } if k == key => {
                raw.split_once('=').map(|(_, value)| unquote(value.trim()).to_owned())
            }
            _ => None,
        })
    }

    /// Replace the first entry with `key` in place, or append it.
    pub fn set(&mut self, key: &str, value: &str) {
        let entry = EnvLine::Entry {
            key: key.to_owned(),
            raw: format!("{}={}\n", key, value),
        };
        let position = self
            .lines
            .iter()
            .position(|line| matches!(line, EnvLine::Entry { key: k, .. } if k == key));

        match position {
            Some(index) => self.lines[index] = entry,
            None => {
                if let Some(EnvLine::Entry { raw, .. } | EnvLine::Other(raw)) = self.lines.last_mut() {
                    if !raw.ends_with('\n') {
                        raw.push('\n');
                    }
                }
                self.lines.push(entry);
            }
        }
    }

    pub fn render(&self) -> String {
        self.lines
            .iter()
            .map(|line| match line {
                EnvLine::Entry { raw, .. } => raw.as_str(),
                EnvLine::Other(raw) => raw.as_str(),
            })
            .collect()
    }
}

fn parse_key(raw: &str) -> Option<&str> {
    let line = raw.trim_start();
    if line.starts_with('#') {
        return None;
    }
    let line = line.strip_prefix("export ").unwrap_or(line);
    let (key, _) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() || key.contains(char::is_whitespace) {
        return None;
    }
    Some(key)
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}
