use std::io::Write;

use super::*;

fn write_temp(contents: &[u8], suffix: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("create temp file");
    file.write_all(contents).expect("write temp file");
    file.flush().unwrap();
    file
}

#[test]
fn loads_whitespace_columns() {
    let mut body = String::from("# synthetic spectrum\n");
    for i in 0..32 {
        body.push_str(&format!("{} {}\n", 4000.0 + i as f64 * 10.0, 1.0 + i as f32 * 0.1));
    }
    let file = write_temp(body.as_bytes(), ".dat");
    let spectrum = Spectrum::from_file(file.path()).unwrap();
    assert_eq!(spectrum.len(), 32);
    assert!((spectrum.wave[0] - 4000.0).abs() < 1e-9);
    assert!((spectrum.flux[31] - 4.1).abs() < 1e-6);
}

#[test]
fn loads_csv_with_header() {
    let mut body = String::from("wave,flux\n");
    for i in 0..20 {
        body.push_str(&format!("{},{}\n", 5000.0 + i as f64, 2.0));
    }
    let file = write_temp(body.as_bytes(), ".csv");
    let spectrum = Spectrum::from_file(file.path()).unwrap();
    assert_eq!(spectrum.len(), 20);
}

#[test]
fn trims_non_finite_and_sorts() {
    let mut wave: Vec<f64> = (0..40).map(|i| 4000.0 + i as f64).collect();
    let mut flux = vec![1.0f32; 40];
    flux[3] = f32::NAN;
    flux[7] = f32::INFINITY;
    wave.swap(10, 20);
    flux[10] = 5.0;
    let spectrum = Spectrum::new(wave, flux).unwrap();
    assert_eq!(spectrum.len(), 38);
    assert!(spectrum.wave.windows(2).all(|w| w[1] > w[0]));
}

#[test]
fn too_few_samples_is_empty_spectrum() {
    let wave: Vec<f64> = (0..10).map(|i| 4000.0 + i as f64).collect();
    let flux = vec![1.0f32; 10];
    assert!(matches!(
        Spectrum::new(wave, flux),
        Err(crate::Error::EmptySpectrum)
    ));
}

#[test]
fn garbage_file_is_bad_input() {
    let file = write_temp(b"this is not a spectrum\nneither is this\n", ".txt");
    assert!(matches!(
        Spectrum::from_file(file.path()),
        Err(crate::Error::BadInput { .. })
    ));
}

#[test]
fn loads_minimal_fits() {
    let n = 64usize;
    fn push_card(h: &mut String, text: &str) {
        h.push_str(&format!("{:<80}", text));
    }
    let mut header = String::new();
    push_card(&mut header, "SIMPLE  =                    T");
    push_card(&mut header, "BITPIX  =                  -32");
    push_card(&mut header, "NAXIS   =                    1");
    push_card(&mut header, &format!("NAXIS1  =                 {n:>4}"));
    push_card(&mut header, "CRVAL1  =               4000.0 / start");
    push_card(&mut header, "CDELT1  =                  2.5");
    push_card(&mut header, "CRPIX1  =                  1.0");
    push_card(&mut header, "END");
    let mut bytes = header.into_bytes();
    bytes.resize(2880, b' ');

    for i in 0..n {
        bytes.extend_from_slice(&(1.0f32 + i as f32).to_be_bytes());
    }
    bytes.resize(2880 * 2, 0);

    let file = write_temp(&bytes, ".fits");
    let spectrum = Spectrum::from_file(file.path()).unwrap();
    assert_eq!(spectrum.len(), n);
    assert!((spectrum.wave[0] - 4000.0).abs() < 1e-9);
    assert!((spectrum.wave[1] - 4002.5).abs() < 1e-9);
    assert!((spectrum.flux[10] - 11.0).abs() < 1e-6);
}

#[test]
fn fits_with_two_axes_is_rejected() {
    let mut header = String::new();
    for card in [
        "SIMPLE  =                    T",
        "BITPIX  =                  -32",
        "NAXIS   =                    2",
        "NAXIS1  =                   16",
        "NAXIS2  =                    2",
        "END",
    ] {
        header.push_str(&format!("{:<80}", card));
    }
    let mut bytes = header.into_bytes();
    bytes.resize(2880, b' ');
    let file = write_temp(&bytes, ".fits");
    assert!(matches!(
        Spectrum::from_file(file.path()),
        Err(crate::Error::BadInput { .. })
    ));
}
