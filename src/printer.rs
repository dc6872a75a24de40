use core::fmt::{self, Write};

pub fn write_ascii_escaped(formatter: &mut fmt::Formatter, input: &[u8]) -> fmt::Result {
    for byte in input {
        for esc_byte in core::ascii::escape_default(*byte) {
            formatter.write_char(esc_byte as char)?;
        }
    }
    Ok(())
}

/// Displays raw field bytes with everything outside printable ASCII escaped.
pub struct Escaped<'a>(pub &'a [u8]);

impl<'a> fmt::Display for Escaped<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write_ascii_escaped(f, self.0)
    }
}

#[test]
fn test_write_ascii_escaped() {
    use arrayvec::ArrayString;

    fn test(input: &'static [u8], expected: &'static str) {
        let mut output = ArrayString::<[_; 100]>::new();

        write!(&mut output, "{}", Escaped(input)).unwrap();
        assert_eq!(&output, expected);
    }

    test(b"test", "test");
    test(b"T\x00\x00", "T\\x00\\x00");
    test(b"aaa\tbbb", "aaa\\tbbb");
    test(b"aaa\xffbbb", "aaa\\xffbbb");
    test(
        b"aaa\xff\xf0\xf0\xf0\xf0bbb",
        "aaa\\xff\\xf0\\xf0\\xf0\\xf0bbb",
    );
}

