use super::{ProbeResult, ProbeState};
use crate::error::CsvError;
use std::str::FromStr;

const FIELDS: usize = 5;

impl ProbeResult {
    /// Renders `state, datarate_dl, datarate_ul, total_transfer_time, payload_size`.
    ///
    /// The state is written by name; floats use the shortest form that
    /// parses back to the same value.
    pub fn to_csv(&self, delimiter: char) -> String {
        format!(
            "{state}{d}{dl}{d}{ul}{d}{time}{d}{size}",
            state = self.state.name(),
            dl = self.datarate_dl,
            ul = self.datarate_ul,
            time = self.total_transfer_time,
            size = self.payload_size,
            d = delimiter,
        )
    }

    /// Parses a record written by [`ProbeResult::to_csv`]. The state field may
    /// also be given as its integer code.
    pub fn from_csv(line: &str, delimiter: char) -> Result<Self, CsvError> {
        let fields: Vec<&str> = line.trim_end_matches(['\r', '\n']).split(delimiter).map(str::trim).collect();
        if fields.len() != FIELDS {
            return Err(CsvError::FieldCount(fields.len()));
        }

        let state = ProbeState::from_name(fields[0])
            .or_else(|| fields[0].parse::<u8>().ok().and_then(ProbeState::from_code))
            .ok_or_else(|| CsvError::State(fields[0].to_string()))?;

        Ok(Self {
            state,
            datarate_dl: number(fields[1], "datarate_dl")?,
            datarate_ul: number(fields[2], "datarate_ul")?,
            total_transfer_time: number(fields[3], "total_transfer_time")?,
            payload_size: number(fields[4], "payload_size")?,
        })
    }
}

fn number<T: FromStr>(value: &str, field: &'static str) -> Result<T, CsvError> {
    value.parse().map_err(|_| CsvError::Number {
        field,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::Direction;
    use std::time::Duration;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn test_field_order() {
        let res = ProbeResult {
            state: ProbeState::Finished,
            datarate_dl: 1.5,
            datarate_ul: 0.0,
            total_transfer_time: 2.25,
            payload_size: 42,
        };
        assert_eq!(res.to_csv(','), "FINISHED,1.5,0,2.25,42");
        assert_eq!(res.to_csv(';'), "FINISHED;1.5;0;2.25;42");
    }

    #[test]
    fn test_parse_back_measured_result() {
        let res = ProbeResult::measured(
            ProbeState::Finished,
            Direction::Download,
            1_048_576,
            Duration::from_micros(734_219),
        );
        let parsed = ProbeResult::from_csv(&res.to_csv('\t'), '\t').unwrap();

        assert_eq!(parsed.state, res.state);
        assert!(close(parsed.datarate_dl, res.datarate_dl));
        assert!(close(parsed.datarate_ul, res.datarate_ul));
        assert!(close(parsed.total_transfer_time, res.total_transfer_time));
        assert_eq!(parsed.payload_size, res.payload_size);
    }

    #[test]
    fn test_parse_accepts_state_code_and_newline() {
        let parsed = ProbeResult::from_csv("3,0,10,0.5,5\n", ',').unwrap();
        assert_eq!(parsed.state, ProbeState::Error);
        assert_eq!(parsed.payload_size, 5);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(ProbeResult::from_csv("FINISHED,1,2", ','), Err(CsvError::FieldCount(3)));
        assert!(matches!(
            ProbeResult::from_csv("DONE,1,2,3,4", ','),
            Err(CsvError::State(_))
        ));
        assert!(matches!(
            ProbeResult::from_csv("FINISHED,1,x,3,4", ','),
            Err(CsvError::Number { field: "datarate_ul", .. })
        ));
        assert!(matches!(
            ProbeResult::from_csv("FINISHED,1,2,3,-4", ','),
            Err(CsvError::Number { field: "payload_size", .. })
        ));
    }
}
