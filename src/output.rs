use crate::results::OutputRecord;
use anyhow::anyhow;
use csv::WriterBuilder;
use formatx::formatx;
use indexmap::IndexMap;
use lazy_static::lazy_static;
use std::fmt::Debug;
use std::fs::File;
use std::io;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::debug;

pub trait Output: Debug {
    fn writer_for_location_key(
        &self,
        location_key: &str,
        file_extension: &str,
    ) -> anyhow::Result<impl Write>;
    /// Whether this output can be considered a no-op and therefore that any code that only writes to the output can be skipped.
    fn is_noop(&self) -> bool {
        false
    }
}

#[derive(Debug)]
pub struct FileOutput {
    directory_path: PathBuf,
    file_template: String,
}

impl FileOutput {
    /// `file_template` takes the location key and the file extension, e.g. `"site__{}.{}"`.
    pub fn new(directory_path: PathBuf, file_template: String) -> Self {
        Self {
            directory_path,
            file_template,
        }
    }
}

impl Output for FileOutput {
    fn writer_for_location_key(
        &self,
        location_key: &str,
        file_extension: &str,
    ) -> anyhow::Result<impl Write> {
        let file_name = formatx!(&self.file_template, location_key, file_extension)
            .map_err(|err| anyhow!("could not apply file template: {err:?}"))?;
        Ok(BufWriter::new(File::create(
            self.directory_path.join(file_name),
        )?))
    }
}

impl Output for &FileOutput {
    fn writer_for_location_key(
        &self,
        location_key: &str,
        file_extension: &str,
    ) -> anyhow::Result<impl Write> {
        <FileOutput as Output>::writer_for_location_key(self, location_key, file_extension)
    }
}

/// An output that goes to nowhere/ a "sink"/ /dev/null.
#[derive(Debug, Default)]
pub struct SinkOutput;

impl Output for SinkOutput {
    fn writer_for_location_key(
        &self,
        _location_key: &str,
        _file_extension: &str,
    ) -> anyhow::Result<impl Write> {
        Ok(io::sink())
    }

    fn is_noop(&self) -> bool {
        true
    }
}

lazy_static! {
    pub static ref UNITS_MAP: IndexMap<&'static str, &'static str> = IndexMap::from([
        ("billedConsumptionTotal", "[m3/day]"),
        ("unbilledConsumptionTotal", "[m3/day]"),
        ("totalAuthorizedConsumption", "[m3/day]"),
        ("customerMeterUnderRegistration", "[m3/day]"),
        ("unauthorizedConsumption", "[m3/day]"),
        ("commercialLossesTotal", "[m3/day]"),
        ("physicalLosses", "[m3/day]"),
        ("waterLosses", "[m3/day]"),
        ("nrw", "[m3/day]"),
        ("unbilledConsumptionUnmetered", "[m3/day]"),
        ("totalNumberOfServiceConnections", "[count]"),
        ("numberOfIllegalConnections", "[count]"),
        ("pressure", "[m]"),
        ("supplyTime", "[h/day]"),
        ("capl", "[m3/day]"),
        ("mapl", "[m3/day]"),
        ("ili", "[ratio]"),
        ("litersPerConnectionPerDay", "[l/connection/day]"),
        ("litersPerConnectionPerDayPerMeterPressure", "[l/connection/day/m]"),
        ("cubicmeterPerKilometerMainsPerHour", "[m3/km/h]"),
        ("commercialLossesExpressedInPercentOfAuthorizedConsumption", "[%]"),
        ("litersPerConnectionPerDayCommercialLoss", "[l/connection/day]"),
        ("litersPerCustomerPerDayCommercialLoss", "[l/customer/day]"),
        ("volumeOfNonRevenueWater", "[ratio]"),
        ("litersPerConnectionPerDayNRW", "[l/connection/day]"),
        ("valueOfNrw", "[currency/year]"),
        ("valueOfNRWInPercentOfOperatingCosts", "[%]"),
        ("valueOfCommercialLosses", "[currency/year]"),
        ("costValueOfPhyiscalLosses", "[currency/year]"),
    ]);
}

/// Unit of a computed field; relative errors are fractions and spreads share their metric's unit.
fn unit_for(field: &str) -> &'static str {
    if field.ends_with("ERR") {
        return "[ratio]";
    }
    if let Some(metric) = field.strip_suffix("STD") {
        return UNITS_MAP.get(metric).copied().unwrap_or("Unit not defined");
    }
    if field.ends_with("VAR") {
        return "[squared unit]";
    }
    UNITS_MAP.get(field).copied().unwrap_or("Unit not defined")
}

/// Writes the computed fields as a CSV file: a row of field names, a row of units and a row of values.
pub fn write_results(
    output: &impl Output,
    output_key: &str,
    record: &OutputRecord,
) -> anyhow::Result<()> {
    debug!("writing out to {output_key}");
    let writer = output.writer_for_location_key(output_key, "csv")?;
    let mut writer = WriterBuilder::new().flexible(true).from_writer(writer);

    let computed = record.computed();
    writer.write_record(computed.keys())?;
    writer.write_record(computed.keys().map(|field| unit_for(field)))?;
    writer.write_record(computed.values().map(|value| value.to_string()))?;

    debug!("flushing out CSV");
    writer.flush()?;

    Ok(())
}

/// Writes the whole merged record, input fields included, as pretty-printed JSON.
pub fn write_results_json(
    output: &impl Output,
    output_key: &str,
    record: &OutputRecord,
) -> anyhow::Result<()> {
    let mut writer = output.writer_for_location_key(output_key, "json")?;
    serde_json::to_writer_pretty(&mut writer, record)?;
    writer.flush()?;

    Ok(())
}
