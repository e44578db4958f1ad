use super::*;

use std::io::{BufReader, BufWriter};

#[test]
fn test_alert() -> Result<()> {
    let raw = vec![0x02, 0x0A];
    let mut reader = BufReader::new(raw.as_slice());
    let alert = Alert::unmarshal(&mut reader)?;
    assert_eq!(alert, Alert::fatal(AlertDescription::UnexpectedMessage));

    let mut out = vec![];
    {
        let mut writer = BufWriter::<&mut Vec<u8>>::new(out.as_mut());
        alert.marshal(&mut writer)?;
    }
    assert_eq!(out, raw);

    Ok(())
}

#[test]
fn test_alert_invalid_values() -> Result<()> {
    let raw = vec![0x03, 0x99];
    let mut reader = BufReader::new(raw.as_slice());
    let alert = Alert::unmarshal(&mut reader)?;
    assert_eq!(alert.alert_level, AlertLevel::Invalid);
    assert_eq!(alert.alert_description, AlertDescription::Invalid);

    let short = vec![0x02];
    let mut reader = BufReader::new(short.as_slice());
    assert!(Alert::unmarshal(&mut reader).is_err());

    Ok(())
}
