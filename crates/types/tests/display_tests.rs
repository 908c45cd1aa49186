use types::DecodedValue;

fn render(value: f64) -> String {
    DecodedValue::Number(value).to_string()
}

#[test]
fn numbers_render_like_decimal_floats() {
    assert_eq!(render(10.0), "10.0");
    assert_eq!(render(5.68), "5.68");
    assert_eq!(render(-1234.5), "-1234.5");
    assert_eq!(render(0.0), "0.0");
    assert_eq!(render(-0.0), "-0.0");
    assert_eq!(render(0.0001), "0.0001");
    assert_eq!(render(1e15), "1000000000000000.0");
}

#[test]
fn extreme_numbers_switch_to_exponent_form() {
    assert_eq!(render(1e16), "1e+16");
    assert_eq!(render(-2.5e20), "-2.5e+20");
    assert_eq!(render(1.5e-5), "1.5e-05");
    assert_eq!(render(3.4028234663852886e38), "3.4028234663852886e+38");
    assert_eq!(render(1e-100), "1e-100");
}

#[test]
fn other_variants_render_verbatim() {
    assert_eq!(DecodedValue::Zero.to_string(), "0");
    assert_eq!(DecodedValue::Integer(68).to_string(), "68");
    assert_eq!(DecodedValue::Label("Charge".to_string()).to_string(), "Charge");
}
