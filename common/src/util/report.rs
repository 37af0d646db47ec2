use crate::db::core::FAILED_STEPS;
use crate::db::indices::NetId;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub fn format_line(net: NetId, steps: i64) -> String {
    if steps == FAILED_STEPS {
        format!("Routing failed for net_id {}", net)
    } else {
        format!("route id: {} => steps: {}", net, steps)
    }
}

pub fn write_to<W: Write>(
    out: &mut W,
    entries: impl IntoIterator<Item = (NetId, i64)>,
) -> std::io::Result<()> {
    for (net, steps) in entries {
        writeln!(out, "{}", format_line(net, steps))?;
    }
    Ok(())
}

pub fn write_report(
    filename: impl AsRef<Path>,
    entries: impl IntoIterator<Item = (NetId, i64)>,
) -> std::io::Result<()> {
    let mut file = BufWriter::new(File::create(filename)?);
    write_to(&mut file, entries)?;
    file.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_line_per_net() {
        let mut buf = Vec::new();
        write_to(
            &mut buf,
            [(NetId::new(1), 5), (NetId::new(2), FAILED_STEPS)],
        )
        .unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "route id: 1 => steps: 5\nRouting failed for net_id 2\n"
        );
    }
}
