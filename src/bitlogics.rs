/// Channel value is on when its most significant bit is set
const CHANNEL_THRESHOLD_MASK: u8 = 0x80;

/// Get a bit value on a unsigned number
pub fn get_bit_at(input: u8, n: u8) -> bool {
    if n < 8 {
        input & (1 << n) != 0 // 1 == true, 0 == false
    } else {
        panic!("The bit position must be between 0 and 7 inclusively on a 8 bits number");
    }
}

/// Get the bit stored at a position of a byte slice, reading every byte from its
/// most significant bit. `None` once the position is past the end of the slice.
pub fn get_bit_in_slice(data: &[u8], bit_position: usize) -> Option<bool> {
    let byte = data.get(bit_position / 8)?;
    Some(get_bit_at(*byte, 7 - (bit_position % 8) as u8))
}

// Get channel intensity from a bit
pub fn get_channel_for_bit(bit: bool) -> u8 {
    if bit {
        255 // full intensity
    } else {
        0
    }
}

/// Get the bit value from a single channel. Does not need to be perfect white or black,
/// only the high bit is looked at so codec noise below the threshold is tolerated.
pub fn get_bit_from_channel(value: u8) -> bool {
    value & CHANNEL_THRESHOLD_MASK != 0
}

/// Change a bit from an existing byte
pub fn mutate_byte(byte_val: &mut u8, bit_val: bool, position: u8) {
    let bi = if bit_val { 1 } else { 0 };
    *byte_val = *byte_val & !(1 << position) | (bi << position);
}

/// Set the bit at a position of a byte slice, most significant bit first.
pub fn set_bit_in_slice(data: &mut [u8], bit_position: usize, bit_val: bool) {
    mutate_byte(
        &mut data[bit_position / 8],
        bit_val,
        7 - (bit_position % 8) as u8,
    );
}
