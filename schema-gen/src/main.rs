use easycalc::input::InputRecord;
use schemars::schema_for;

fn main() -> anyhow::Result<()> {
    let schema = schema_for!(InputRecord);
    println!("{}", serde_json::to_string_pretty(&schema)?);

    Ok(())
}
