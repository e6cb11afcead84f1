/*!
 * SANITIZER - Masquage des secrets avant tout envoi vers l'IA ou l'affichage
 *
 * Règles (ligne par ligne, découpage sur les blancs) :
 * - `password` / `secret` [type numérique] <valeur>   => <HIDDEN>
 * - `encrypted password <valeur>`                      => <HIDDEN>
 * - `snmp-server community <valeur>`                   => <HIDDEN>
 * - IPv4 publique (RFC1918 conservée)                  => <MASKED_IP>
 * - MAC `xxxx.xxxx.xxxx`, `xx:xx:..`, `xx-xx-..`       => <MASKED_MAC>
 */

use std::net::Ipv4Addr;

pub const HIDDEN: &str = "<HIDDEN>";
pub const MASKED_IP: &str = "<MASKED_IP>";
pub const MASKED_MAC: &str = "<MASKED_MAC>";

pub trait Sanitizer: Send + Sync {
    fn sanitize(&self, text: &str) -> String;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSanitizer;

impl Sanitizer for DefaultSanitizer {
    fn sanitize(&self, text: &str) -> String {
        text.split('\n').map(sanitize_line).collect::<Vec<_>>().join("\n")
    }
}

fn keyword(word: &str) -> String {
    word.trim_end_matches([':', '=']).to_ascii_lowercase()
}

fn sanitize_line(line: &str) -> String {
    // (début, fin) de chaque mot non blanc
    let mut spans: Vec<(usize, usize)> = Vec::new();
    let mut start: Option<usize> = None;
    for (i, c) in line.char_indices() {
        match (c.is_whitespace(), start) {
            (true, Some(s)) => {
                spans.push((s, i));
                start = None;
            }
            (false, None) => start = Some(i),
            _ => {}
        }
    }
    if let Some(s) = start {
        spans.push((s, line.len()));
    }

    let words: Vec<&str> = spans.iter().map(|&(s, e)| &line[s..e]).collect();
    let mut hidden = vec![false; words.len()];
    for (i, word) in words.iter().enumerate() {
        match keyword(word).as_str() {
            "password" | "secret" => {
                let Some(next) = words.get(i + 1) else { continue };
                let is_type = next.chars().all(|c| c.is_ascii_digit());
                if is_type && i + 2 < words.len() {
                    hidden[i + 2] = true;
                } else {
                    hidden[i + 1] = true;
                }
            }
            "community" if i > 0 && keyword(words[i - 1]) == "snmp-server" => {
                if i + 1 < words.len() {
                    hidden[i + 1] = true;
                }
            }
            _ => {}
        }
    }

    let mut out = String::with_capacity(line.len());
    let mut cursor = 0;
    for (idx, &(s, e)) in spans.iter().enumerate() {
        out.push_str(&line[cursor..s]);
        if hidden[idx] {
            out.push_str(HIDDEN);
        } else {
            out.push_str(&mask_ipv4(&mask_mac(&line[s..e])));
        }
        cursor = e;
    }
    out.push_str(&line[cursor..]);
    out
}

/// Remplace les séquences maximales de caractères `in_run` qui passent `test`
fn replace_runs(word: &str, in_run: fn(char) -> bool, trim: &[char], test: fn(&str) -> bool, replacement: &str) -> String {
    let mut out = String::with_capacity(word.len());
    let mut run = String::new();
    let flush = |run: &mut String, out: &mut String| {
        if run.is_empty() {
            return;
        }
        let core = run.trim_matches(trim);
        if !core.is_empty() && test(core) {
            // séparateurs de bord conservés
            let lead = run.len() - run.trim_start_matches(trim).len();
            let tail = run.len() - run.trim_end_matches(trim).len();
            out.push_str(&run[..lead]);
            out.push_str(replacement);
            out.push_str(&run[run.len() - tail..]);
        } else {
            out.push_str(run);
        }
        run.clear();
    };
    for c in word.chars() {
        if in_run(c) {
            run.push(c);
        } else {
            flush(&mut run, &mut out);
            out.push(c);
        }
    }
    flush(&mut run, &mut out);
    out
}

fn is_mac(candidate: &str) -> bool {
    let hex = |part: &str, len: usize| part.len() == len && part.chars().all(|c| c.is_ascii_hexdigit());
    if let Some(sep) = candidate.chars().find(|c| *c == ':' || *c == '-') {
        let parts: Vec<&str> = candidate.split(sep).collect();
        parts.len() == 6 && parts.iter().all(|p| hex(p, 2))
    } else {
        let parts: Vec<&str> = candidate.split('.').collect();
        parts.len() == 3 && parts.iter().all(|p| hex(p, 4))
    }
}

fn mask_mac(word: &str) -> String {
    replace_runs(
        word,
        |c| c.is_ascii_hexdigit() || c == ':' || c == '.' || c == '-',
        &[':', '.', '-'],
        is_mac,
        MASKED_MAC,
    )
}

fn is_public_ipv4(candidate: &str) -> bool {
    candidate.parse::<Ipv4Addr>().is_ok_and(|ip| !ip.is_private())
}

fn is_octet_text(part: &str) -> bool {
    (1..=3).contains(&part.len()) && part.bytes().all(|b| b.is_ascii_digit())
}

/// Fenêtres de 4 composants dans une suite pointée : `1.2.3.4.5` => `<MASKED_IP>.5`
fn mask_dotted_run(run: &str) -> String {
    let parts: Vec<&str> = run.split('.').collect();
    let mut out: Vec<String> = Vec::with_capacity(parts.len());
    let mut i = 0;
    while i < parts.len() {
        if let Some(window) = parts.get(i..i + 4) {
            if window.iter().all(|p| is_octet_text(p)) && is_public_ipv4(&window.join(".")) {
                out.push(MASKED_IP.to_string());
                i += 4;
                continue;
            }
        }
        out.push(parts[i].to_string());
        i += 1;
    }
    out.join(".")
}

fn mask_ipv4(word: &str) -> String {
    let mut out = String::with_capacity(word.len());
    let mut run = String::new();
    for c in word.chars() {
        if c.is_ascii_digit() || c == '.' {
            run.push(c);
        } else {
            if !run.is_empty() {
                out.push_str(&mask_dotted_run(&run));
                run.clear();
            }
            out.push(c);
        }
    }
    if !run.is_empty() {
        out.push_str(&mask_dotted_run(&run));
    }
    out
}
