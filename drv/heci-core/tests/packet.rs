// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod common;

use common::{bytes, emu, endpoint, ready, FALLBACK_BASE};
use drv_heci_api::{DeviceFault, HeciError, MessageHeader, ReadMode};
use drv_heci_core::Trace;

fn words_of(data: &[u8]) -> Vec<u32> {
    data.chunks(4)
        .map(|c| {
            let mut le = [0u8; 4];
            le[..c.len()].copy_from_slice(c);
            u32::from_le_bytes(le)
        })
        .collect()
}

#[test]
fn write_then_read_round_trip() {
    let mut ep = ready(emu().with_loopback());
    let header = MessageHeader::new(0x07, 0x00, 12, true);
    let payload = [0x0403_0201, 0x0807_0605, 0x0c0b_0a09];

    ep.write_packet(header, &payload).unwrap();
    assert_eq!(ep.platform().host_packets(), [header]);

    let mut buf = [0u8; 64];
    let got = ep.read_packet(ReadMode::Blocking, &mut buf).unwrap();
    assert_eq!(got, Some(header));
    assert_eq!(&buf[..12], &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]);
    assert_eq!(ep.stats().packets_sent, 1);
    assert_eq!(ep.stats().packets_received, 1);
}

#[test]
fn partial_last_word_is_trimmed() {
    let mut ep = ready(emu().with_loopback());
    let data = bytes(6);
    let header = MessageHeader::new(0x07, 0x00, 6, true);
    ep.write_packet(header, &words_of(&data)).unwrap();

    let mut buf = [0xaau8; 8];
    ep.read_packet(ReadMode::Blocking, &mut buf).unwrap();
    assert_eq!(&buf[..6], &data[..]);
    assert_eq!(&buf[6..], &[0xaa, 0xaa]);
}

#[test]
fn ring_pointers_wrap() {
    let mut ep = ready(emu().with_depths(16, 16).with_ring_origin(250).with_loopback());
    for n in [4, 40, 60, 12] {
        let data = bytes(n);
        let header = MessageHeader::new(0x07, 0x00, n as u16, true);
        ep.write_packet(header, &words_of(&data)).unwrap();

        let mut buf = [0u8; 64];
        assert_eq!(ep.read_packet(ReadMode::Blocking, &mut buf), Ok(Some(header)));
        assert_eq!(&buf[..n], &data[..]);
    }
    assert!(ep.platform().me_ring().read_pointer() < 250);
}

#[test]
fn room_for_header_is_required() {
    let mut e = emu().with_depths(4, 4);
    e.stall_host_ring(true);
    let mut ep = ready(e);

    // Three payload words and the header fill a four-slot ring exactly.
    let header = MessageHeader::new(0x07, 0x00, 12, true);
    ep.write_packet(header, &[1, 2, 3]).unwrap();
    assert_eq!(ep.platform().delays(), 0);
    assert_eq!(ep.platform().host_ring().filled(), 4);

    let small = MessageHeader::new(0x07, 0x00, 4, true);
    assert_eq!(ep.write_packet(small, &[1]), Err(HeciError::Timeout));
    // send_timeout_us / poll_quantum_us
    assert_eq!(ep.platform().delays(), 10);
    assert!(ep
        .trace()
        .contains(&Trace::NoRoom { free: 0, needed: 2 }));
}

#[test]
fn packet_larger_than_ring_is_refused() {
    let mut ep = ready(emu().with_depths(4, 4));
    let header = MessageHeader::new(0x07, 0x00, 16, true);
    assert_eq!(
        ep.write_packet(header, &[1, 2, 3, 4]),
        Err(HeciError::DeviceError(DeviceFault::BadLength))
    );
    assert_eq!(ep.platform().host_ring().filled(), 0);
}

#[test]
fn short_payload_is_refused() {
    let mut ep = ready(emu());
    let header = MessageHeader::new(0x07, 0x00, 12, true);
    assert_eq!(ep.write_packet(header, &[1]), Err(HeciError::BufferTooSmall));
    assert_eq!(ep.platform().host_ring().filled(), 0);
}

#[test]
fn ready_drop_after_write() {
    let mut ep = ready(emu());
    ep.platform_mut().drop_ready_after_write();

    let header = MessageHeader::new(0x07, 0x00, 4, true);
    assert_eq!(
        ep.write_packet(header, &[0xdead_beef]),
        Err(HeciError::DeviceError(DeviceFault::RemoteNotReady))
    );
    assert_eq!(ep.stats().device_errors, 1);
    assert_eq!(ep.stats().packets_sent, 0);
    assert!(ep.trace().contains(&Trace::NotReadyAfterWrite));
}

#[test]
fn non_blocking_read_of_empty_ring() {
    let mut ep = ready(emu());
    let mut buf = [0u8; 16];
    assert_eq!(ep.read_packet(ReadMode::NonBlocking, &mut buf), Ok(None));
    assert_eq!(ep.platform().delays(), 0);
}

#[test]
fn blocking_read_of_empty_ring_times_out() {
    let mut ep = ready(emu());
    let mut buf = [0u8; 16];
    assert_eq!(
        ep.read_packet(ReadMode::Blocking, &mut buf),
        Err(HeciError::Timeout)
    );
    assert_eq!(ep.platform().delays(), 10);
    assert_eq!(ep.stats().timeouts, 1);
}

#[test]
fn corrupt_pointers_are_overflow() {
    let mut ep = ready(emu());
    ep.platform_mut().corrupt_me_pointers(0, 200);

    let mut buf = [0u8; 16];
    assert_eq!(
        ep.read_packet(ReadMode::NonBlocking, &mut buf),
        Err(HeciError::DeviceError(DeviceFault::Overflow))
    );
    assert!(ep.trace().contains(&Trace::Overflow {
        read: 0,
        write: 200,
        depth: 128
    }));
}

#[test]
fn full_ring_is_not_overflow() {
    let mut ep = ready(emu());
    ep.platform_mut().corrupt_me_pointers(0, 128);

    let mut buf = [0u8; 16];
    assert!(matches!(
        ep.read_packet(ReadMode::NonBlocking, &mut buf),
        Ok(Some(_))
    ));
}

#[test]
fn oversized_length_is_bad() {
    let mut ep = ready(emu());
    let header = MessageHeader::new(0x07, 0x00, 511, true);
    ep.platform_mut().queue_raw_packet(&[header.bits()]);

    let mut buf = [0u8; 512];
    assert_eq!(
        ep.read_packet(ReadMode::Blocking, &mut buf),
        Err(HeciError::DeviceError(DeviceFault::BadLength))
    );
}

#[test]
fn largest_fitting_length_is_accepted() {
    // 508 bytes and a header fill a 128-slot ring exactly.
    let mut ep = ready(emu());
    let data = bytes(508);
    ep.platform_mut().queue_message(0x00, 0x07, &data);

    let mut buf = [0u8; 512];
    let header = ep.read_packet(ReadMode::Blocking, &mut buf).unwrap().unwrap();
    assert_eq!(header.length(), 508);
    assert!(header.message_complete());
    assert_eq!(&buf[..508], &data[..]);
}

#[test]
fn small_buffer_leaves_packet_queued() {
    let mut ep = ready(emu());
    let data = bytes(20);
    ep.platform_mut().queue_message(0x00, 0x07, &data);

    let mut small = [0u8; 8];
    assert_eq!(
        ep.read_packet(ReadMode::Blocking, &mut small),
        Err(HeciError::BufferTooSmall)
    );
    assert!(ep.trace().contains(&Trace::BufferTooSmall { len: 20, room: 8 }));

    let mut buf = [0u8; 32];
    let header = ep.read_packet(ReadMode::NonBlocking, &mut buf).unwrap().unwrap();
    assert_eq!(header.length(), 20);
    assert_eq!(&buf[..20], &data[..]);
    assert_eq!(ep.platform().me_ring().filled(), 0);
}

#[test]
fn zero_length_packet() {
    let mut ep = ready(emu());
    ep.platform_mut().queue_message(0x00, 0x07, &[]);

    let mut buf = [0u8; 0];
    let header = ep.read_packet(ReadMode::Blocking, &mut buf).unwrap().unwrap();
    assert_eq!(header.length(), 0);
    assert!(header.message_complete());
}

#[test]
fn ready_drop_during_read() {
    let mut ep = ready(emu());
    ep.platform_mut().queue_message(0x00, 0x07, &bytes(8));
    ep.platform_mut().drop_ready_after_read();

    let mut buf = [0u8; 16];
    assert_eq!(
        ep.read_packet(ReadMode::Blocking, &mut buf),
        Err(HeciError::DeviceError(DeviceFault::RemoteNotReady))
    );
    assert!(ep.trace().contains(&Trace::NotReadyAfterRead));
}

#[test]
fn write_on_fresh_endpoint_maps_registers_first() {
    let mut ep = endpoint(emu());
    let header = MessageHeader::new(0x07, 0x00, 4, true);
    ep.write_packet(header, &[0xdead_beef]).unwrap();

    assert_eq!(ep.base(), Some(FALLBACK_BASE));
    assert_eq!(ep.platform().host_ring().filled(), 2);
}

#[test]
fn packet_io_on_absent_function_is_not_found() {
    let mut ep = endpoint(emu().absent());
    let header = MessageHeader::new(0x07, 0x00, 4, true);
    assert_eq!(
        ep.write_packet(header, &[0xdead_beef]),
        Err(HeciError::NotFound)
    );

    let mut buf = [0u8; 16];
    assert_eq!(
        ep.read_packet(ReadMode::NonBlocking, &mut buf),
        Err(HeciError::NotFound)
    );
    assert_eq!(ep.base(), None);
}
