//! Integration tests for the warper-core command encoder and reply codec.
//!
//! These tests drive the public API the same way the transports do: build a
//! command, encode it for one link, and decode the reply the service would
//! send back.

use warper_core::domain::pointers::{
    ARRAY_START, INVALID_START, META_BASE, PLAYER_POSITION, TIME, WEATHER,
};
use warper_core::protocol::codec::{
    decode_peek_hex, decode_pointer_hex, decode_pointer_le, encode_hex, frame_usb,
    usb_payload_len, transfer_chunks, USB_MAX_TRANSFER,
};
use warper_core::{ScreenState, SwitchButton, SwitchCommand, SwitchProtocol, SwitchStick};

#[test]
fn test_every_fixed_chain_encodes_as_pointer_all() {
    let expected = [
        (PLAYER_POSITION, "pointerAll 0x47D71A0 0x248 0x0 0x138 0x90"),
        (WEATHER, "pointerAll 0x612FC30 0xB0 0x28 0x0"),
        (TIME, "pointerAll 0x40FE500 0x20 0x40 0x30"),
        (META_BASE, "pointerAll 0x40FE500 0xB8 0x0"),
        (ARRAY_START, "pointerAll 0x40FE500 0xB8 0x378 0x0"),
        (INVALID_START, "pointerAll 0x40FE500 0xB8 0x380 0x0"),
    ];

    for (chain, text) in expected {
        assert_eq!(SwitchCommand::pointer_all(&chain).to_string(), text, "chain {chain}");
    }
}

#[test]
fn test_line_ending_follows_protocol() {
    // Arrange
    let detach = SwitchCommand::DetachController;

    // Act
    let wifi = detach.encode(SwitchProtocol::WiFi.uses_crlf());
    let usb = detach.encode(SwitchProtocol::Usb.uses_crlf());

    // Assert
    assert_eq!(wifi, b"detachController\r\n");
    assert_eq!(usb, b"detachController");
}

#[test]
fn test_usb_frame_wraps_unterminated_command() {
    // Arrange
    let cmd = SwitchCommand::SetScreen(ScreenState::Off);

    // Act
    let framed = frame_usb(&cmd.encode(false));

    // Assert
    let header: [u8; 4] = framed[..4].try_into().unwrap();
    assert_eq!(usb_payload_len(header), "screenOff".len());
    assert_eq!(&framed[4..], b"screenOff");
}

#[test]
fn test_wifi_peek_reply_decodes_into_requested_length() {
    // Arrange – the service answers with 2 hex digits per byte.
    let data = [0x00, 0x00, 0x20, 0x41, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x80, 0xBF];
    let reply = format!("{}\n", encode_hex(&data));

    // Act
    let decoded = decode_peek_hex(reply.as_bytes(), data.len()).unwrap();

    // Assert
    assert_eq!(decoded, data);
}

#[test]
fn test_pointer_replies_agree_across_links() {
    let address = 0x0000_0081_0203_0405u64;
    let wifi_reply = format!("{}\n", encode_hex(&address.to_be_bytes()));

    assert_eq!(decode_pointer_hex(wifi_reply.as_bytes()).unwrap(), address);
    assert_eq!(decode_pointer_le(&address.to_le_bytes()).unwrap(), address);
}

#[test]
fn test_poke_chunks_cover_the_whole_payload_without_overlap() {
    let chunks = transfer_chunks(0x8000_0000, USB_MAX_TRANSFER * 3 + 1, USB_MAX_TRANSFER);

    assert_eq!(chunks.len(), 4);
    let total: usize = chunks.iter().map(|(_, len)| len).sum();
    assert_eq!(total, USB_MAX_TRANSFER * 3 + 1);
    for pair in chunks.windows(2) {
        assert_eq!(pair[0].0 + pair[0].1 as u64, pair[1].0);
    }
}

#[test]
fn test_macro_inputs_encode_as_expected() {
    let commands = [
        SwitchCommand::Click(SwitchButton::LStick),
        SwitchCommand::Press(SwitchButton::A),
        SwitchCommand::Release(SwitchButton::A),
        SwitchCommand::reset_stick(SwitchStick::Left),
    ];
    let text: Vec<String> = commands.iter().map(ToString::to_string).collect();

    assert_eq!(
        text,
        vec!["click LSTICK", "press A", "release A", "setStick LEFT 0 0"]
    );
}
